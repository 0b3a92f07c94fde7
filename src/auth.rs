//! Defines the source of OAuth2 access tokens used to call Google
//! APIs.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The header every metadata server request must carry.
const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

/// The bearer token accepted by the Firestore emulator.
const EMULATOR_TOKEN: &str = "owner";

/// The metadata server's token response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// A token obtained from the metadata server.
pub struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Where access tokens come from.
pub enum Credentials {
    /// A token given up front.
    Static(String),

    /// The default service account of the running instance, as served
    /// by the metadata server.
    Metadata {
        http: Client,
        endpoint: String,
        cache: Mutex<Option<CachedToken>>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Static(_) => f.write_str("Credentials::Static"),
            Credentials::Metadata { endpoint, .. } => f
                .debug_struct("Credentials::Metadata")
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

impl Credentials {
    /// Credentials accepted by local emulators.
    pub fn emulator() -> Self {
        Credentials::Static(String::from(EMULATOR_TOKEN))
    }

    /// Credentials served by the metadata server at `endpoint`.
    pub fn metadata(http: Client, endpoint: &str) -> Self {
        Credentials::Metadata {
            http,
            endpoint: String::from(endpoint.trim_end_matches('/')),
            cache: Mutex::new(None),
        }
    }

    /// Get a valid access token, fetching a fresh one if the cached
    /// token is missing or about to expire.
    pub async fn access_token(&self) -> Result<String> {
        match self {
            Credentials::Static(token) => Ok(token.clone()),
            Credentials::Metadata {
                http,
                endpoint,
                cache,
            } => {
                let mut cached = cache.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }
                let url = format!(
                    "{}/computeMetadata/v1/instance/service-accounts/default/token",
                    endpoint
                );
                let response: TokenResponse = http
                    .get(&url)
                    .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("Failed to request an access token from {:?}", url))?
                    .json()
                    .await
                    .context("Failed to decode the metadata server's token response")?;
                let value = response.access_token.clone();
                *cached = Some(CachedToken {
                    value: response.access_token,
                    refresh_at: Instant::now()
                        + Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN),
                });
                Ok(value)
            }
        }
    }
}

/// Ask the metadata server for the project the instance runs in.
pub async fn metadata_project_id(http: &Client, endpoint: &str) -> Result<String> {
    let url = format!(
        "{}/computeMetadata/v1/project/project-id",
        endpoint.trim_end_matches('/')
    );
    let project = http
        .get(&url)
        .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to request the project id from {:?}", url))?
        .text()
        .await
        .context("Failed to read the metadata server's project id")?;
    let project = project.trim();
    if project.is_empty() {
        return Err(anyhow!("the metadata server returned an empty project id"));
    }
    Ok(String::from(project))
}

#[cfg(test)]
mod tests {
    use super::{metadata_project_id, Credentials};
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn static_credentials_are_returned_as_is() {
        let credentials = Credentials::Static(String::from("ya29.static"));
        assert_eq!(credentials.access_token().await.unwrap(), "ya29.static");
        assert_eq!(Credentials::emulator().access_token().await.unwrap(), "owner");
    }

    #[tokio::test]
    async fn metadata_tokens_are_cached_until_close_to_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/computeMetadata/v1/instance/service-accounts/default/token",
            ))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Credentials::metadata(Client::new(), &server.uri());
        assert_eq!(credentials.access_token().await.unwrap(), "ya29.fresh");
        assert_eq!(credentials.access_token().await.unwrap(), "ya29.fresh");
    }

    #[tokio::test]
    async fn metadata_failures_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let credentials = Credentials::metadata(Client::new(), &server.uri());
        assert!(credentials.access_token().await.is_err());
    }

    #[tokio::test]
    async fn project_id_is_read_from_the_metadata_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/computeMetadata/v1/project/project-id"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string("demo-project\n"))
            .mount(&server)
            .await;

        let project = metadata_project_id(&Client::new(), &server.uri())
            .await
            .unwrap();
        assert_eq!(project, "demo-project");
    }
}
