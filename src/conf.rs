//! Defines configuration as read from the environment.

use serde::Deserialize;

/// Default `firestore_database` value.
fn default_firestore_database() -> String {
    String::from("(default)")
}

/// Default `users_collection` value.
fn default_users_collection() -> String {
    String::from("users")
}

/// Default `match_document` value.
fn default_match_document() -> String {
    String::from("friendships/*")
}

/// Default `target_field` value.
fn default_target_field() -> String {
    String::from("targetId")
}

/// Default `token_field` value.
fn default_token_field() -> String {
    String::from("fcmToken")
}

/// Default `notification_title` value.
fn default_notification_title() -> String {
    String::from("새 친구 요청")
}

/// Default `notification_body` value.
fn default_notification_body() -> String {
    String::from("친구 요청을 확인하세요!")
}

/// Default `port` value.
fn default_port() -> u16 {
    8080
}

/// The notifier reacts to documents created in Firestore, looks up
/// the recipient's registration token and sends it a push
/// notification through FCM. The configuration must be given as
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// The Google Cloud project that owns both the Firestore database
    /// and the FCM sender. If omitted, it's asked to the metadata
    /// server.
    #[serde(default)]
    pub google_cloud_project: Option<String>,

    /// The Firestore database holding the user documents.
    #[serde(default = "default_firestore_database")]
    pub firestore_database: String,

    /// The collection where user documents are kept, keyed by user
    /// identifier.
    #[serde(default = "default_users_collection")]
    pub users_collection: String,

    /// Defines a filter to select only matching created documents,
    /// relative to the database root. The star (*) can be used as a
    /// wildcard matching any number of non-slash characters.
    #[serde(default = "default_match_document")]
    pub match_document: String,

    /// The field of the created document that holds the recipient's
    /// user identifier.
    #[serde(default = "default_target_field")]
    pub target_field: String,

    /// The field of the user document that holds the FCM
    /// registration token.
    #[serde(default = "default_token_field")]
    pub token_field: String,

    /// The title of every notification sent.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// The body of every notification sent.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    /// If set, messages are only validated by FCM and never delivered.
    #[serde(default)]
    pub fcm_dry_run: bool,

    /// The port the event receiver listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address of a local Firestore emulator. When given, user
    /// lookups are sent there over plain HTTP with the emulator's
    /// fixed credentials.
    #[serde(default)]
    pub firestore_emulator_host: Option<String>,

    /// Overrides the Firestore REST endpoint.
    #[serde(default)]
    pub firestore_endpoint_url: Option<String>,

    /// Overrides the FCM REST endpoint.
    #[serde(default)]
    pub fcm_endpoint_url: Option<String>,

    /// Overrides the metadata server endpoint.
    #[serde(default)]
    pub metadata_endpoint_url: Option<String>,

    /// A ready-to-use OAuth2 access token. Takes precedence over the
    /// metadata server.
    #[serde(default)]
    pub google_oauth_access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Settings;

    fn settings_from(vars: Vec<(&str, &str)>) -> Settings {
        envy::from_iter(
            vars.into_iter()
                .map(|(k, v)| (String::from(k), String::from(v))),
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_the_friend_request_deployment() {
        let settings = settings_from(vec![]);
        assert_eq!(settings.google_cloud_project, None);
        assert_eq!(settings.firestore_database, "(default)");
        assert_eq!(settings.users_collection, "users");
        assert_eq!(settings.match_document, "friendships/*");
        assert_eq!(settings.target_field, "targetId");
        assert_eq!(settings.token_field, "fcmToken");
        assert_eq!(settings.notification_title, "새 친구 요청");
        assert_eq!(settings.notification_body, "친구 요청을 확인하세요!");
        assert!(!settings.fcm_dry_run);
        assert_eq!(settings.port, 8080);
    }

    #[test]
    fn overrides_are_read_from_upper_case_variables() {
        let settings = settings_from(vec![
            ("GOOGLE_CLOUD_PROJECT", "demo"),
            ("USERS_COLLECTION", "profiles"),
            ("FCM_DRY_RUN", "true"),
            ("PORT", "9000"),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8081"),
        ]);
        assert_eq!(settings.google_cloud_project.as_deref(), Some("demo"));
        assert_eq!(settings.users_collection, "profiles");
        assert!(settings.fcm_dry_run);
        assert_eq!(settings.port, 9000);
        assert_eq!(
            settings.firestore_emulator_host.as_deref(),
            Some("localhost:8081")
        );
    }
}
