use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NotificationId = i64;

/// A stored notification and its dispatch state.
///
/// `processed` means a dispatch attempt has completed, not that every
/// device token accepted the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub analytics_label: String,
    pub device_tokens: Vec<String>,
    pub data: HashMap<String, String>,
    pub processed: bool,
    pub processing: bool,
    /// Set while a scheduler holds the claim; used to expire abandoned claims.
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_claimable(&self) -> bool {
        !self.processed && !self.processing
    }
}

/// A notification accepted by ingress but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub message: String,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub analytics_label: String,
    pub device_tokens: Vec<String>,
    pub data: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Convenience constructor used by tests and tooling.
    pub fn new<I, S>(title: impl Into<String>, body: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: String::new(),
            title: title.into(),
            body: body.into(),
            image_url: String::new(),
            analytics_label: String::new(),
            device_tokens: tokens.into_iter().map(Into::into).collect(),
            data: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Materialise the row a store would hold right after insertion.
    pub fn into_stored(self, id: NotificationId) -> Notification {
        Notification {
            id,
            message: self.message,
            title: self.title,
            body: self.body,
            image_url: self.image_url,
            analytics_label: self.analytics_label,
            device_tokens: self.device_tokens,
            data: self.data,
            processed: false,
            processing: false,
            claimed_at: None,
            created_at: self.created_at,
        }
    }
}
