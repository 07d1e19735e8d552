use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use herald_types::Notification;

/// One delivery request, addressed to a single device token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub analytics_label: String,
    pub data: HashMap<String, String>,
}

/// Build one message per device token, in token order.
pub fn build_messages(notification: &Notification) -> Vec<PushMessage> {
    notification
        .device_tokens
        .iter()
        .map(|token| PushMessage {
            token: token.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            image_url: notification.image_url.clone(),
            analytics_label: notification.analytics_label.clone(),
            data: notification.data.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOutcome {
    pub token: String,
    pub error: Option<String>,
}

impl TokenOutcome {
    pub fn delivered(token: impl Into<String>) -> Self {
        Self { token: token.into(), error: None }
    }

    pub fn failed(token: impl Into<String>, error: impl Into<String>) -> Self {
        Self { token: token.into(), error: Some(error.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-token results of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub outcomes: Vec<TokenOutcome>,
}

impl SendReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Errors that prevent a batch from being attempted at all.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials could not be loaded or the client could not be set up.
    #[error("gateway init failed: {0}")]
    Init(String),

    #[error("gateway misconfigured: {0}")]
    Config(String),
}

/// External push-delivery service.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Attempt every message; individual failures are reported, not returned.
    async fn send_each(&self, messages: &[PushMessage]) -> Result<SendReport, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_types::NewNotification;

    #[test]
    fn one_message_per_token() {
        let n = NewNotification::new("Title", "Body", ["a", "b", "c"])
            .with_data("k", "v")
            .into_stored(1);

        let messages = build_messages(&n);

        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages.iter().map(|m| m.token.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert!(messages.iter().all(|m| m.title == "Title" && m.data["k"] == "v"));
    }

    #[test]
    fn report_counts() {
        let report = SendReport {
            outcomes: vec![
                TokenOutcome::delivered("a"),
                TokenOutcome::failed("b", "unregistered"),
                TokenOutcome::delivered("c"),
            ],
        };
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
    }
}
