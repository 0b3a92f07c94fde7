//! Defines the Google API client shared by the user store and the
//! push gateway.

use crate::auth::{metadata_project_id, Credentials};
use crate::conf::Settings;
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use tracing::info;

/// Default Firestore REST endpoint.
const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Default FCM REST endpoint.
const FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Default metadata server endpoint.
const METADATA_ENDPOINT: &str = "http://metadata.google.internal";

/// Give a scheme to endpoint overrides that lack one.
fn normalize_endpoint(endpoint: &str, default_scheme: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        String::from(endpoint)
    } else {
        format!("{}://{}", default_scheme, endpoint)
    }
}

/// The initialized client: an HTTP connection pool, the project the
/// calls are made on behalf of, and the credentials to authorize
/// them. Cloning it is cheap.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    http: Client,
    credentials: Arc<Credentials>,

    /// The Google Cloud project.
    pub project_id: String,

    /// Base URL of the Firestore REST API.
    pub firestore_endpoint: String,

    /// Base URL of the FCM REST API.
    pub fcm_endpoint: String,
}

impl GoogleClient {
    /// Assemble a client from its parts.
    pub fn new(
        http: Client,
        credentials: Credentials,
        project_id: &str,
        firestore_endpoint: &str,
        fcm_endpoint: &str,
    ) -> Self {
        GoogleClient {
            http,
            credentials: Arc::new(credentials),
            project_id: String::from(project_id),
            firestore_endpoint: normalize_endpoint(firestore_endpoint, "https"),
            fcm_endpoint: normalize_endpoint(fcm_endpoint, "https"),
        }
    }

    /// Start a GET request carrying a bearer token.
    pub async fn get(&self, url: &str) -> Result<RequestBuilder> {
        let token = self.credentials.access_token().await?;
        Ok(self.http.get(url).bearer_auth(token))
    }

    /// Start a POST request carrying a bearer token.
    pub async fn post(&self, url: &str) -> Result<RequestBuilder> {
        let token = self.credentials.access_token().await?;
        Ok(self.http.post(url).bearer_auth(token))
    }
}

/// Initialize the Google API client. This is expected to be done
/// once, before any event is received.
pub async fn init(settings: &Settings) -> Result<GoogleClient> {
    let http = Client::builder()
        .build()
        .context("Failed to build the HTTP client")?;
    let metadata_endpoint = normalize_endpoint(
        settings
            .metadata_endpoint_url
            .as_deref()
            .unwrap_or(METADATA_ENDPOINT),
        "http",
    );

    let project_id = match &settings.google_cloud_project {
        Some(project) => project.clone(),
        None => metadata_project_id(&http, &metadata_endpoint)
            .await
            .context("GOOGLE_CLOUD_PROJECT is not set and couldn't be discovered")?,
    };

    let firestore_endpoint = match (
        &settings.firestore_emulator_host,
        &settings.firestore_endpoint_url,
    ) {
        (Some(host), _) => normalize_endpoint(host, "http"),
        (None, Some(url)) => normalize_endpoint(url, "https"),
        (None, None) => String::from(FIRESTORE_ENDPOINT),
    };
    let fcm_endpoint = settings
        .fcm_endpoint_url
        .as_deref()
        .map(|url| normalize_endpoint(url, "https"))
        .unwrap_or_else(|| String::from(FCM_ENDPOINT));

    let credentials = if let Some(token) = &settings.google_oauth_access_token {
        Credentials::Static(token.clone())
    } else if settings.firestore_emulator_host.is_some() {
        Credentials::emulator()
    } else {
        Credentials::metadata(http.clone(), &metadata_endpoint)
    };

    info!(
        "Using project {:?}, Firestore at {:?} and FCM at {:?}",
        project_id, firestore_endpoint, fcm_endpoint
    );
    Ok(GoogleClient::new(
        http,
        credentials,
        &project_id,
        &firestore_endpoint,
        &fcm_endpoint,
    ))
}

#[cfg(test)]
mod tests {
    use super::{init, normalize_endpoint};
    use crate::conf::Settings;

    fn settings_from(vars: Vec<(&str, &str)>) -> Settings {
        envy::from_iter(
            vars.into_iter()
                .map(|(k, v)| (String::from(k), String::from(v))),
        )
        .unwrap()
    }

    #[test]
    fn endpoints_without_scheme_get_the_default_one() {
        assert_eq!(
            normalize_endpoint("localhost:8080", "http"),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_endpoint("fcm.example.com/", "https"),
            "https://fcm.example.com"
        );
        assert_eq!(
            normalize_endpoint("http://127.0.0.1:9000", "https"),
            "http://127.0.0.1:9000"
        );
    }

    #[tokio::test]
    async fn emulator_host_takes_precedence_over_endpoint_overrides() {
        let client = init(&settings_from(vec![
            ("GOOGLE_CLOUD_PROJECT", "demo"),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8081"),
            ("FIRESTORE_ENDPOINT_URL", "firestore.example.com"),
        ]))
        .await
        .unwrap();

        assert_eq!(client.project_id, "demo");
        assert_eq!(client.firestore_endpoint, "http://localhost:8081");
        assert_eq!(client.fcm_endpoint, "https://fcm.googleapis.com");
    }

    #[tokio::test]
    async fn default_endpoints_are_google_apis() {
        let client = init(&settings_from(vec![
            ("GOOGLE_CLOUD_PROJECT", "demo"),
            ("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.static"),
        ]))
        .await
        .unwrap();

        assert_eq!(client.firestore_endpoint, "https://firestore.googleapis.com");
        assert_eq!(client.fcm_endpoint, "https://fcm.googleapis.com");
    }
}
