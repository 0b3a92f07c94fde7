//! Defines the read-only application state and hub for utility
//! functions.

use crate::conf::Settings;
use crate::messaging::Notification;
use crate::trigger::Trigger;
use anyhow::{Context, Result};
use envy::from_env;
use regex::Regex;
use tracing::info;

/// Event types that announce a newly created document.
const CREATED_EVENT_TYPES: [&str; 2] = [
    "google.cloud.firestore.document.v1.created",
    "google.cloud.firestore.document.v1.created.withAuthContext",
];

/// Translate a wildcard filter into an anchored regex, where `*`
/// matches any run of non-slash characters.
fn wildcard_regex(filter: &str) -> Result<Regex> {
    let pattern = filter
        .split('*')
        .map(regex::escape)
        .collect::<Vec<String>>()
        .join("[^/]*?");
    Regex::new(&format!("^{}$", pattern))
        .with_context(|| format!("Invalid document filter {:?}", filter))
}

/// An App is an initialized application state, derived from
/// settings. This is only useful to pre-compute stuff that will be
/// used constantly.
#[derive(Debug, Clone)]
pub struct App {
    /// The original settings.
    pub settings: Settings,

    /// The regex that matches created document paths.
    pub match_document_re: Regex,

    /// The notification sent for every friend request.
    pub notification: Notification,
}

impl App {
    /// Initialize an App instance given a settings struct. Consumes
    /// the settings struct.
    pub fn new(settings: Settings) -> Result<Self> {
        let match_document_re = wildcard_regex(&settings.match_document)?;
        let notification = Notification {
            title: settings.notification_title.clone(),
            body: settings.notification_body.clone(),
        };
        Ok(App {
            settings,
            match_document_re,
            notification,
        })
    }

    /// Whether a trigger announces the creation of a relationship
    /// record. Triggers that don't are logged and skipped.
    pub fn should_handle(&self, trigger: &Trigger) -> bool {
        if !CREATED_EVENT_TYPES.contains(&trigger.event_type.as_str()) {
            info!(
                "Ignoring event {:?} of type {:?}",
                trigger.id, trigger.event_type
            );
            return false;
        }
        let path = trigger.document_path();
        if !self.match_document_re.is_match(path) {
            info!(
                "Ignoring event {:?} for document {:?}, which doesn't match {:?}",
                trigger.id, path, self.settings.match_document
            );
            return false;
        }
        true
    }
}

/// Initialize the App from the environment.
pub fn init() -> Result<App> {
    let settings = from_env().context("Invalid configuration")?;
    App::new(settings)
}

#[cfg(test)]
mod tests {
    use super::{wildcard_regex, App};
    use crate::conf::Settings;
    use crate::document::Document;
    use crate::trigger::Trigger;

    fn app_with(vars: Vec<(&str, &str)>) -> App {
        let settings: Settings = envy::from_iter(
            vars.into_iter()
                .map(|(k, v)| (String::from(k), String::from(v))),
        )
        .unwrap();
        App::new(settings).unwrap()
    }

    fn trigger(event_type: &str, name: &str) -> Trigger {
        Trigger {
            id: String::from("evt-1"),
            event_type: String::from(event_type),
            source: String::new(),
            subject: None,
            document: Document::with_string_fields(name, [("targetId", "u1")]),
        }
    }

    #[test]
    fn wildcards_stop_at_slashes() {
        let re = wildcard_regex("friendships/*").unwrap();
        assert!(re.is_match("friendships/abc"));
        assert!(!re.is_match("friendships/abc/history/1"));
        assert!(!re.is_match("users/abc"));
        assert!(!re.is_match("friendships"));
    }

    #[test]
    fn literal_characters_are_escaped() {
        let re = wildcard_regex("groups/*/friendships.v2/*").unwrap();
        assert!(re.is_match("groups/g1/friendships.v2/f1"));
        assert!(!re.is_match("groups/g1/friendshipsXv2/f1"));
    }

    #[test]
    fn notification_comes_from_settings() {
        let app = app_with(vec![("NOTIFICATION_TITLE", "New request")]);
        assert_eq!(app.notification.title, "New request");
        assert_eq!(app.notification.body, "친구 요청을 확인하세요!");
    }

    #[test]
    fn only_created_friendships_are_handled() {
        let app = app_with(vec![]);
        let name = "projects/demo/databases/(default)/documents/friendships/f1";
        assert!(app.should_handle(&trigger(
            "google.cloud.firestore.document.v1.created",
            name
        )));
        assert!(app.should_handle(&trigger(
            "google.cloud.firestore.document.v1.created.withAuthContext",
            name
        )));
        assert!(!app.should_handle(&trigger(
            "google.cloud.firestore.document.v1.updated",
            name
        )));
        assert!(!app.should_handle(&trigger(
            "google.cloud.firestore.document.v1.created",
            "projects/demo/databases/(default)/documents/users/u1"
        )));
    }
}
