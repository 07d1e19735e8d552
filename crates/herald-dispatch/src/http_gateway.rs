use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::gateway::{GatewayError, PushGateway, PushMessage, SendReport, TokenOutcome};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Contents of the credential file.
#[derive(Debug, Deserialize)]
struct Credentials {
    endpoint: String,
    server_key: String,
}

/// Push gateway reached over HTTPS with a JSON body per message.
///
/// The credential file is read for every batch, so rotated keys are picked
/// up without a restart.
pub struct HttpPushGateway {
    client: reqwest::Client,
    credentials_path: PathBuf,
}

impl HttpPushGateway {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            client,
            credentials_path: credentials_path.into(),
        })
    }

    async fn load_credentials(&self) -> Result<Credentials, GatewayError> {
        let raw = tokio::fs::read_to_string(&self.credentials_path)
            .await
            .map_err(|e| {
                GatewayError::Init(format!("{}: {}", self.credentials_path.display(), e))
            })?;

        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Init(format!("{}: {}", self.credentials_path.display(), e))
        })
    }

    async fn send_one(&self, creds: &Credentials, message: &PushMessage) -> TokenOutcome {
        let body = json!({
            "message": {
                "token": message.token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                    "image": message.image_url,
                },
                "data": message.data,
                "android": { "priority": "high" },
                "apns": {
                    "headers": { "apns-priority": "10" },
                    "payload": { "aps": { "sound": "default" } },
                },
                "fcm_options": { "analytics_label": message.analytics_label },
            }
        });

        let result = self
            .client
            .post(&creds.endpoint)
            .bearer_auth(&creds.server_key)
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => TokenOutcome::delivered(&message.token),
            Err(e) => {
                debug!(error = %e, "Push rejected for token");
                TokenOutcome::failed(&message.token, e.to_string())
            }
        }
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    async fn send_each(&self, messages: &[PushMessage]) -> Result<SendReport, GatewayError> {
        let creds = self.load_credentials().await?;

        let outcomes = join_all(messages.iter().map(|m| self.send_one(&creds, m))).await;

        Ok(SendReport { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::path::Path;

    use axum::{Json, Router, http::StatusCode, routing::post};

    use super::*;

    fn message(token: &str) -> PushMessage {
        PushMessage {
            token: token.into(),
            title: "Title".into(),
            body: "Body".into(),
            image_url: String::new(),
            analytics_label: "campaign".into(),
            data: HashMap::new(),
        }
    }

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("herald-gateway-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    async fn fake_push_service() -> SocketAddr {
        async fn accept(Json(body): Json<serde_json::Value>) -> StatusCode {
            if body["message"]["token"] == "stale-token" {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::OK
            }
        }

        let app = Router::new().route("/send", post(accept));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn write_credentials(path: &Path, endpoint: &str) {
        let creds = json!({ "endpoint": endpoint, "server_key": "secret" });
        std::fs::write(path, creds.to_string()).unwrap();
    }

    #[tokio::test]
    async fn missing_credentials_is_an_init_error() {
        let gateway = HttpPushGateway::new("/nonexistent/herald/auth.json").unwrap();
        let err = gateway.send_each(&[message("a")]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Init(_)));
    }

    #[tokio::test]
    async fn malformed_credentials_is_an_init_error() {
        let path = scratch_file("malformed.json");
        std::fs::write(&path, "not json").unwrap();

        let gateway = HttpPushGateway::new(&path).unwrap();
        let err = gateway.send_each(&[message("a")]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Init(_)));
    }

    #[tokio::test]
    async fn counts_each_token_outcome() {
        let addr = fake_push_service().await;
        let path = scratch_file("valid.json");
        write_credentials(&path, &format!("http://{}/send", addr));

        let gateway = HttpPushGateway::new(&path).unwrap();
        let report = gateway
            .send_each(&[message("good-1"), message("stale-token"), message("good-2")])
            .await
            .unwrap();

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.outcomes[1].is_success());
        assert_eq!(report.outcomes[1].token, "stale-token");
    }
}
