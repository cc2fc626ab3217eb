//! Identity-message dispatch.
//!
//! Every send is audited: a `Pending` entry is written before the
//! transport is called, and is moved to `Sent` or `Failed` once the
//! transport answers or the send times out. An entry is never left
//! pending after [`MessageDispatcher::send`] returns, except when the
//! message log itself cannot be written.

use std::sync::Arc;
use std::time::Duration;

use callguard_phone::PhoneNumberNormalizer;
use callguard_types::repository::{MessageLogRepository, MessageTransport, PolicySource};
use callguard_types::{
    CallguardError, DispatchError, LogId, MessageStatus, NewMessageLogEntry, Timestamp,
};

/// Sends the identity-request message and records the outcome.
pub struct MessageDispatcher {
    normalizer: Arc<PhoneNumberNormalizer>,
    messages: Arc<dyn MessageLogRepository>,
    transport: Arc<dyn MessageTransport>,
    policy: Arc<dyn PolicySource>,
    send_timeout: Duration,
}

impl MessageDispatcher {
    pub fn new(
        normalizer: Arc<PhoneNumberNormalizer>,
        messages: Arc<dyn MessageLogRepository>,
        transport: Arc<dyn MessageTransport>,
        policy: Arc<dyn PolicySource>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            normalizer,
            messages,
            transport,
            policy,
            send_timeout,
        }
    }

    pub async fn send(&self, raw: &str) -> Result<LogId, DispatchError> {
        self.send_at(raw, Timestamp::now()).await
    }

    /// Sends the current template to `raw`, logging the attempt at `now`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidNumber`] if `raw` has no canonical
    ///   form. Nothing is logged.
    /// - [`DispatchError::TransportFailure`] if the transport failed or
    ///   timed out. The entry is marked `Failed`.
    /// - [`DispatchError::Storage`] if the message log write failed.
    pub async fn send_at(&self, raw: &str, now: Timestamp) -> Result<LogId, DispatchError> {
        let number = self
            .normalizer
            .normalize(raw)
            .ok_or_else(|| DispatchError::InvalidNumber {
                raw: raw.to_string(),
            })?;
        let template = self.policy.policy().message_template;

        let log_id = self.messages.append_pending(NewMessageLogEntry {
            raw_number: raw.to_string(),
            number: number.clone(),
            timestamp: now,
            template_used: template.clone(),
        })?;

        let outcome = match tokio::time::timeout(
            self.send_timeout,
            self.transport.send(&number, &template),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "transport did not answer within {}ms",
                self.send_timeout.as_millis()
            )),
        };

        match outcome {
            Ok(()) => {
                self.messages.set_status(log_id, MessageStatus::Sent)?;
                tracing::info!(log_id = %log_id, number = %number, "identity message sent");
                Ok(log_id)
            }
            Err(reason) => {
                if let Err(e) = self.messages.set_status(log_id, MessageStatus::Failed) {
                    tracing::error!(log_id = %log_id, error = %e, "could not mark message failed");
                    return Err(e.into());
                }
                tracing::warn!(log_id = %log_id, number = %number, reason = %reason, "identity message failed");
                Err(DispatchError::TransportFailure { log_id, reason })
            }
        }
    }

    /// Sends again to the number of a `Failed` entry.
    ///
    /// The failed entry stays as it is; the retry gets its own entry.
    pub async fn resend(&self, failed: LogId) -> Result<LogId, DispatchError> {
        let entry = self
            .messages
            .get(failed)?
            .ok_or_else(|| CallguardError::StorageError {
                reason: format!("message {failed} not found"),
            })?;
        if entry.status != MessageStatus::Failed {
            return Err(CallguardError::ConfigError {
                reason: format!("message {failed} is {}, only FAILED messages can be resent", entry.status),
            }
            .into());
        }
        self.send(&entry.raw_number).await
    }
}
