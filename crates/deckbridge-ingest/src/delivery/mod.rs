//! Relay of extracted messages to the publishing endpoint.
//!
//! Delivery is a single attempt. Whatever the outcome, the caller records the
//! post as processed afterwards; failures are reported, never retried.

mod http;

pub use http::{DeliveryRequest, HttpDeliveryClient, HttpDeliveryConfig};

use async_trait::async_trait;
use deckbridge_core::Message;

use crate::store::Credentials;

/// Why a delivery did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The endpoint answered with a non-success status.
    Status { code: u16, body: String },
    /// Connection refused, DNS failure, broken response and the like.
    Transport(String),
    Timeout,
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryFailure::Status { code, body } => write!(f, "HTTP {}: {}", code, body),
            DeliveryFailure::Transport(reason) => write!(f, "transport error: {}", reason),
            DeliveryFailure::Timeout => write!(f, "request timed out"),
        }
    }
}

/// Terminal state of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(DeliveryFailure),
}

/// Result of probing the endpoint's health route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    ServerError(u16),
    Unreachable(String),
    TimedOut,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "server is reachable"),
            HealthStatus::ServerError(code) => write!(f, "server error (HTTP {})", code),
            HealthStatus::Unreachable(reason) => write!(f, "cannot reach server: {}", reason),
            HealthStatus::TimedOut => write!(f, "connection timed out"),
        }
    }
}

/// Sends messages to the publishing endpoint.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Make exactly one delivery attempt.
    async fn deliver(&self, credentials: &Credentials, message: &Message) -> DeliveryOutcome;

    async fn health(&self) -> HealthStatus;
}
