//! Identity-message eligibility.
//!
//! Checks run in a fixed order and the first failing one names the
//! skip reason: disabled, excluded, non-mobile, cooldown. A number that
//! passes all four is sent to, or queued for confirmation when
//! confirmation mode is on.

use std::sync::Arc;

use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::{MessageLogRepository, PolicySource};
use callguard_types::{MessageDecision, Result, SkipReason, Timestamp};

/// Decides whether a rejected caller should receive the identity
/// request.
pub struct MessageEligibility {
    normalizer: Arc<PhoneNumberNormalizer>,
    messages: Arc<dyn MessageLogRepository>,
    policy: Arc<dyn PolicySource>,
}

impl MessageEligibility {
    pub fn new(
        normalizer: Arc<PhoneNumberNormalizer>,
        messages: Arc<dyn MessageLogRepository>,
        policy: Arc<dyn PolicySource>,
    ) -> Self {
        Self {
            normalizer,
            messages,
            policy,
        }
    }

    pub fn evaluate(&self, raw: &str) -> Result<MessageDecision> {
        self.evaluate_at(raw, Timestamp::now())
    }

    /// Evaluates eligibility as of `now`.
    ///
    /// # Errors
    ///
    /// Propagates a message log read failure from the cooldown check.
    pub fn evaluate_at(&self, raw: &str, now: Timestamp) -> Result<MessageDecision> {
        let policy = self.policy.policy();

        if !policy.auto_message_enabled {
            return Ok(skip(SkipReason::Disabled));
        }
        if self.normalizer.should_exclude_from_messaging(raw) {
            return Ok(skip(SkipReason::Excluded));
        }
        if !self.normalizer.is_mobile(raw) {
            return Ok(skip(SkipReason::NonMobile));
        }

        let Some(number) = self.normalizer.normalize(raw) else {
            return Ok(skip(SkipReason::Excluded));
        };
        if let Some(last_sent) = self.messages.last_sent_at(&number)? {
            if now.millis_since(&last_sent) < policy.cooldown_millis() {
                return Ok(skip(SkipReason::Cooldown));
            }
        }

        if policy.confirmation_mode_enabled {
            Ok(MessageDecision::AskConfirmation)
        } else {
            Ok(MessageDecision::Send)
        }
    }
}

fn skip(reason: SkipReason) -> MessageDecision {
    MessageDecision::Skip { reason }
}
