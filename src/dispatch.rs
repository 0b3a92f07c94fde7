//! Defines the notification dispatcher: given a newly created
//! relationship record, resolve the recipient's registration token
//! and send it the friend request notification.

use crate::app::App;
use crate::document::Document;
use crate::messaging::{DeliveryError, Message, Notification, PushGateway};
use crate::store::{LookupError, UserStore};
use tracing::{error, info, instrument, warn};

/// How the handling of one relationship record ended. Each outcome
/// is logged exactly once, and none of them is an error for the
/// caller.
#[derive(Debug)]
pub enum Outcome {
    /// The gateway accepted the notification.
    Sent { target_id: String, message_id: String },

    /// The record doesn't name a recipient.
    MissingTarget { document: String },

    /// The recipient doesn't exist.
    NotFound { target_id: String },

    /// The recipient has no registration token.
    TokenMissing { target_id: String },

    /// The recipient couldn't be looked up.
    LookupFailed {
        target_id: String,
        error: LookupError,
    },

    /// The gateway didn't accept the notification.
    DeliveryFailed {
        target_id: String,
        error: DeliveryError,
    },
}

impl Outcome {
    /// Emit the log line describing this outcome.
    pub fn log(&self) {
        match self {
            Outcome::Sent {
                target_id,
                message_id,
            } => info!(
                "Notification sent to user with ID {} as {}",
                target_id, message_id
            ),
            Outcome::MissingTarget { document } => {
                error!("No target user ID found in document {:?}", document)
            }
            Outcome::NotFound { target_id } => {
                error!("User document with ID {} not found", target_id)
            }
            Outcome::TokenMissing { target_id } => {
                warn!("User with ID {} does not have an FCM token", target_id)
            }
            Outcome::LookupFailed { target_id, error } => error!(
                "Error while looking up user with ID {}: {}",
                target_id, error
            ),
            Outcome::DeliveryFailed { target_id, error } => error!(
                transient = error.is_transient(),
                "Error while sending notification to user with ID {}: {}",
                target_id,
                error
            ),
        }
    }
}

/// The dispatcher, holding its collaborators.
#[derive(Debug)]
pub struct Dispatcher<S, G> {
    store: S,
    gateway: G,
    notification: Notification,
    target_field: String,
    token_field: String,
}

impl<S: UserStore, G: PushGateway> Dispatcher<S, G> {
    /// Build a dispatcher using the app's field names and
    /// notification.
    pub fn new(app: &App, store: S, gateway: G) -> Self {
        Dispatcher {
            store,
            gateway,
            notification: app.notification.clone(),
            target_field: app.settings.target_field.clone(),
            token_field: app.settings.token_field.clone(),
        }
    }

    /// Handle a relationship record and log how it went.
    #[instrument(skip(self, record), fields(document = %record.name))]
    pub async fn dispatch(&self, record: &Document) -> Outcome {
        let outcome = match record.string_field(&self.target_field) {
            Some(target_id) => self.notify(target_id).await,
            None => Outcome::MissingTarget {
                document: record.name.clone(),
            },
        };
        outcome.log();
        outcome
    }

    /// Send the notification to the user identified by `target_id`.
    pub async fn notify(&self, target_id: &str) -> Outcome {
        let target_id = String::from(target_id);
        let user = match self.store.get(&target_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Outcome::NotFound { target_id },
            Err(error) => return Outcome::LookupFailed { target_id, error },
        };
        let Some(token) = user.string_field(&self.token_field) else {
            return Outcome::TokenMissing { target_id };
        };
        let message = Message::new(self.notification.clone(), token);
        match self.gateway.send(&message).await {
            Ok(message_id) => Outcome::Sent {
                target_id,
                message_id,
            },
            Err(error) => Outcome::DeliveryFailed { target_id, error },
        }
    }
}
