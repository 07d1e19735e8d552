use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::NewNotification;

// -- Send --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendNotificationRequest {
    pub notification: Option<NotificationPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub device_tokens: Vec<String>,
    #[serde(default)]
    pub analytics_label: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl NotificationPayload {
    pub fn into_new(self, created_at: DateTime<Utc>) -> NewNotification {
        NewNotification {
            message: self.message,
            title: self.title,
            body: self.body,
            image_url: self.image_url,
            analytics_label: self.analytics_label,
            device_tokens: self.device_tokens,
            data: self.data,
            created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendNotificationResponse {
    pub message: String,
}

// -- Health --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}
