//! JSON-over-HTTP delivery client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deckbridge_core::Message;
use metrics::{counter, histogram};
use serde::Serialize;

use super::{DeliveryClient, DeliveryFailure, DeliveryOutcome, HealthStatus};
use crate::Result;
use crate::store::Credentials;

/// Endpoint locations and timeouts.
#[derive(Debug, Clone)]
pub struct HttpDeliveryConfig {
    pub server_url: String,
    pub health_url: String,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for HttpDeliveryConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000/post-to-bluesky".to_string(),
            health_url: "http://localhost:5000/health".to_string(),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }
}

/// Request body: destination credentials followed by the message fields.
#[derive(Debug, Serialize)]
pub struct DeliveryRequest<'a> {
    pub handle: &'a str,
    #[serde(rename = "appPassword")]
    pub app_password: &'a str,
    #[serde(flatten)]
    pub message: &'a Message,
}

/// [`DeliveryClient`] over reqwest.
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    config: HttpDeliveryConfig,
}

impl HttpDeliveryClient {
    pub fn new(config: HttpDeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, credentials: &Credentials, message: &Message) -> DeliveryOutcome {
        let body = DeliveryRequest {
            handle: &credentials.handle,
            app_password: &credentials.app_password,
            message,
        };

        tracing::info!(post_id = %message.post_id, handle = %credentials.handle, "Delivering post");
        let start = Instant::now();

        let result = self
            .client
            .post(&self.config.server_url)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await;

        histogram!("delivery_request_duration_seconds").record(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                if status == reqwest::StatusCode::OK {
                    tracing::info!(post_id = %message.post_id, "Delivered post: {}", text);
                    DeliveryOutcome::Delivered
                } else {
                    DeliveryOutcome::Failed(DeliveryFailure::Status {
                        code: status.as_u16(),
                        body: text,
                    })
                }
            }
            Err(e) if e.is_timeout() => DeliveryOutcome::Failed(DeliveryFailure::Timeout),
            Err(e) => DeliveryOutcome::Failed(DeliveryFailure::Transport(e.to_string())),
        };

        match &outcome {
            DeliveryOutcome::Delivered => {
                counter!("delivery_posts_delivered_total").increment(1);
            }
            DeliveryOutcome::Failed(failure) => {
                tracing::error!(
                    post_id = %message.post_id,
                    url = %message.source_url,
                    "Delivery failed: {}",
                    failure
                );
                counter!("delivery_posts_failed_total").increment(1);
            }
        }
        outcome
    }

    async fn health(&self) -> HealthStatus {
        let result = self
            .client
            .get(&self.config.health_url)
            .timeout(self.config.health_timeout)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => HealthStatus::Healthy,
            Ok(resp) => HealthStatus::ServerError(resp.status().as_u16()),
            Err(e) if e.is_timeout() => HealthStatus::TimedOut,
            Err(e) => HealthStatus::Unreachable(e.to_string()),
        }
    }
}
