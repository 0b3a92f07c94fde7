//! Defines the user store, from which notification recipients are
//! resolved.

use crate::client::GoogleClient;
use crate::document::{Document, Value};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::instrument;

#[cfg(test)]
use mockall::automock;

/// A user document that exists in the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserRecord {
    /// The user identifier.
    pub id: String,

    /// The document's fields.
    pub fields: BTreeMap<String, Value>,
}

impl UserRecord {
    /// Get a non-empty string field.
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl From<Document> for UserRecord {
    fn from(document: Document) -> Self {
        UserRecord {
            id: String::from(document.id()),
            fields: document.fields,
        }
    }
}

/// Reasons a lookup couldn't tell whether a user exists.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("couldn't authorize the lookup: {0}")]
    Credentials(String),

    #[error("the lookup request failed: {0}")]
    Transport(String),

    #[error("the store answered with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("couldn't decode the user document: {0}")]
    Decode(String),
}

/// Read access to user records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get the user identified by `user_id`, or `None` if there's no
    /// such user.
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, LookupError>;
}

/// User records kept as documents of a Firestore collection.
#[derive(Debug, Clone)]
pub struct FirestoreUserStore {
    client: GoogleClient,
    database: String,
    collection: String,
}

impl FirestoreUserStore {
    pub fn new(client: GoogleClient, database: &str, collection: &str) -> Self {
        FirestoreUserStore {
            client,
            database: String::from(database),
            collection: String::from(collection),
        }
    }

    /// The REST URL of a user document. The identifier is encoded as
    /// a single path segment.
    fn document_url(&self, user_id: &str) -> Result<Url, LookupError> {
        let mut url = Url::parse(&self.client.firestore_endpoint)
            .map_err(|e| LookupError::Transport(format!("invalid Firestore endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Transport(String::from("invalid Firestore endpoint")))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.client.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
            ])
            .extend(self.collection.split('/'))
            .push(user_id);
        Ok(url)
    }
}

#[async_trait]
impl UserStore for FirestoreUserStore {
    #[instrument(skip(self))]
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>, LookupError> {
        let url = self.document_url(user_id)?;
        let response = self
            .client
            .get(url.as_str())
            .await
            .map_err(|e| LookupError::Credentials(format!("{:#}", e)))?
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let document: Document = response
                    .json()
                    .await
                    .map_err(|e| LookupError::Decode(e.to_string()))?;
                Ok(Some(document.into()))
            }
            status => Err(LookupError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
