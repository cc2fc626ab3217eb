//! Incoming call screening pipeline.
//!
//! For each call:
//!
//! 1. Hidden or malformed numbers are allowed immediately. Nothing is
//!    recorded.
//! 2. The decision chain and the history write run under
//!    `decision_timeout`. If they do not finish in time the call is
//!    allowed and recorded with the `fail-open` reason.
//! 3. A plain unknown-caller rejection is followed by the identity
//!    message check. Spam and block rejections never trigger a message.
//!
//! Screening never fails: every error degrades to allowing the call.

use std::sync::Arc;
use std::time::Duration;

use callguard_phone::PhoneNumberNormalizer;
use callguard_types::{Action, DispatchError, LogId, MessageDecision, SkipReason, Timestamp};
use serde::Serialize;

use crate::decision::{DecisionEngine, Rule};
use crate::dispatcher::MessageDispatcher;
use crate::eligibility::MessageEligibility;
use crate::recorder::EventRecorder;

// ---------------------------------------------------------------------------
// ScreeningOutcome
// ---------------------------------------------------------------------------

/// What happened after the call was answered.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "follow_up", rename_all = "snake_case")]
pub enum FollowUp {
    /// No message step for this action.
    None,
    Sent { log_id: LogId },
    /// The user must approve the message.
    AwaitingConfirmation,
    Skipped { reason: SkipReason },
    SendFailed { log_id: Option<LogId>, reason: String },
}

/// Result of screening one call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ScreeningOutcome {
    pub action: Action,
    /// Call log entry, if one was written.
    pub log_id: Option<LogId>,
    /// Deciding step; `None` for hidden numbers and fail-open.
    #[serde(skip)]
    pub rule: Option<Rule>,
    pub fail_open: bool,
    #[serde(flatten)]
    pub follow_up: FollowUp,
}

impl ScreeningOutcome {
    fn allowed_without_record() -> Self {
        Self {
            action: Action::Allow,
            log_id: None,
            rule: None,
            fail_open: false,
            follow_up: FollowUp::None,
        }
    }

    /// The user should be told about this call.
    pub fn should_notify(&self) -> bool {
        self.action != Action::Allow
    }
}

// ---------------------------------------------------------------------------
// CallScreener
// ---------------------------------------------------------------------------

pub struct CallScreener {
    normalizer: Arc<PhoneNumberNormalizer>,
    engine: Arc<DecisionEngine>,
    recorder: Arc<EventRecorder>,
    eligibility: Arc<MessageEligibility>,
    dispatcher: Arc<MessageDispatcher>,
    decision_timeout: Duration,
}

impl CallScreener {
    pub fn new(
        normalizer: Arc<PhoneNumberNormalizer>,
        engine: Arc<DecisionEngine>,
        recorder: Arc<EventRecorder>,
        eligibility: Arc<MessageEligibility>,
        dispatcher: Arc<MessageDispatcher>,
        decision_timeout: Duration,
    ) -> Self {
        Self {
            normalizer,
            engine,
            recorder,
            eligibility,
            dispatcher,
            decision_timeout,
        }
    }

    /// Screens a call from `raw` (absent for withheld numbers).
    pub async fn screen(&self, raw: Option<&str>) -> ScreeningOutcome {
        let raw = raw.unwrap_or_default().trim();
        if self.normalizer.is_hidden_or_invalid(raw) {
            tracing::debug!("hidden or malformed caller, allowing");
            return ScreeningOutcome::allowed_without_record();
        }

        let decided = tokio::time::timeout(self.decision_timeout, async {
            let verdict = self.engine.evaluate(raw).await;
            let log_id = self.recorder.record(raw, &verdict.action, verdict.rule).await;
            (verdict, log_id)
        })
        .await;

        let (verdict, log_id) = match decided {
            Ok(decided) => decided,
            Err(_) => return self.fail_open(raw),
        };

        for failure in &verdict.soft_failures {
            tracing::warn!(step = %failure.step, error = %failure.reason, "lookup failed, treated as not found");
        }
        let log_id = match log_id {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, "call history write failed");
                None
            }
        };
        tracing::info!(
            number = %self.normalizer.format_for_display(raw),
            action = %verdict.action,
            rule = %verdict.rule,
            "call screened"
        );

        let follow_up = if verdict.action == Action::Reject {
            self.follow_up(raw).await
        } else {
            FollowUp::None
        };

        ScreeningOutcome {
            action: verdict.action,
            log_id,
            rule: Some(verdict.rule),
            fail_open: false,
            follow_up,
        }
    }

    fn fail_open(&self, raw: &str) -> ScreeningOutcome {
        tracing::warn!(
            timeout_ms = self.decision_timeout.as_millis() as u64,
            "decision did not complete in time, allowing call"
        );
        let log_id = match self.recorder.record_fail_open(raw, Timestamp::now()) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, "fail-open history write failed");
                None
            }
        };
        ScreeningOutcome {
            action: Action::Allow,
            log_id,
            rule: None,
            fail_open: true,
            follow_up: FollowUp::None,
        }
    }

    async fn follow_up(&self, raw: &str) -> FollowUp {
        let decision = match self.eligibility.evaluate(raw) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, "message eligibility check failed");
                return FollowUp::SendFailed {
                    log_id: None,
                    reason: e.to_string(),
                };
            }
        };

        match decision {
            MessageDecision::Send => match self.dispatcher.send(raw).await {
                Ok(log_id) => FollowUp::Sent { log_id },
                Err(e) => send_failed(e),
            },
            MessageDecision::AskConfirmation => FollowUp::AwaitingConfirmation,
            MessageDecision::Skip { reason } => {
                tracing::debug!(reason = %reason, "identity message skipped");
                FollowUp::Skipped { reason }
            }
        }
    }
}

fn send_failed(error: DispatchError) -> FollowUp {
    FollowUp::SendFailed {
        log_id: error.log_id(),
        reason: error.to_string(),
    }
}
