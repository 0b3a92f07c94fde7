//! Defines the push gateway through which notifications are
//! delivered, and the messages it accepts.

use crate::client::GoogleClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

#[cfg(test)]
use mockall::automock;

/// FCM error codes worth another attempt later on.
const TRANSIENT_ERROR_CODES: [&str; 3] = ["UNAVAILABLE", "INTERNAL", "QUOTA_EXCEEDED"];

/// The visible part of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// A notification addressed to a single registration token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub notification: Notification,
    pub token: String,
}

impl Message {
    /// Address a notification to `token`.
    pub fn new(notification: Notification, token: &str) -> Self {
        Message {
            notification,
            token: String::from(token),
        }
    }
}

/// Reasons a message wasn't accepted for delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("couldn't authorize the send: {0}")]
    Credentials(String),

    #[error("the send request failed: {0}")]
    Transport(String),

    #[error("the gateway rejected the message with status {status} ({code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
}

impl DeliveryError {
    /// Whether the same message could succeed if sent again later.
    /// Those that can't (unregistered tokens, malformed messages)
    /// would fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Credentials(_) | DeliveryError::Transport(_) => true,
            DeliveryError::Rejected { status, code, .. } => {
                *status == 429 || *status >= 500 || TRANSIENT_ERROR_CODES.contains(&code.as_str())
            }
        }
    }
}

/// Delivery of notifications to devices.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send a message, returning the identifier the gateway assigned
    /// to it.
    async fn send(&self, message: &Message) -> Result<String, DeliveryError>;
}

/// The request body of `messages:send`.
#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a Message,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    validate_only: bool,
}

/// The response body of a successful `messages:send`.
#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

/// The error body of Google APIs.
#[derive(Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    error: ErrorStatus,
}

#[derive(Deserialize, Default)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}

impl ErrorStatus {
    /// The FCM-specific error code if given, or else the canonical
    /// status.
    fn code(self) -> (String, String) {
        let code = self
            .details
            .into_iter()
            .find_map(|d| d.error_code)
            .unwrap_or(self.status);
        (code, self.message)
    }
}

/// Firebase Cloud Messaging, through its HTTP v1 API.
#[derive(Debug, Clone)]
pub struct FcmGateway {
    client: GoogleClient,
    dry_run: bool,
}

impl FcmGateway {
    /// Build a gateway sending on behalf of the client's project. A
    /// dry-run gateway only asks FCM to validate messages.
    pub fn new(client: GoogleClient, dry_run: bool) -> Self {
        FcmGateway { client, dry_run }
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    #[instrument(skip(self, message))]
    async fn send(&self, message: &Message) -> Result<String, DeliveryError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.client.fcm_endpoint, self.client.project_id
        );
        let response = self
            .client
            .post(&url)
            .await
            .map_err(|e| DeliveryError::Credentials(format!("{:#}", e)))?
            .json(&SendRequest {
                message,
                validate_only: self.dry_run,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let sent: SendResponse = response
                .json()
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))?;
            return Ok(sent.name);
        }
        let body = response.text().await.unwrap_or_default();
        let (code, message) = serde_json::from_str::<ErrorResponse>(&body)
            .unwrap_or_default()
            .error
            .code();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            code,
            message: if message.is_empty() { body } else { message },
        })
    }
}
