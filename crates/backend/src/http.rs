use std::env;
use std::time::Duration;

use async_trait::async_trait;
use attend_core::model::{ReportSet, SessionId, SessionRequest};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::client::{AttendanceBackend, CreatedSession, SessionRoster};
use crate::error::{BackendConfigError, BackendError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: Url,
    pub token: String,
}

impl HttpBackendConfig {
    /// Build a config from an explicit base URL and bearer token.
    ///
    /// # Errors
    ///
    /// Returns `BackendConfigError` if the URL does not parse or the token is blank.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, BackendConfigError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(BackendConfigError::MissingToken);
        }
        let parsed = Url::parse(base_url.trim())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| BackendConfigError::InvalidBaseUrl {
                raw: base_url.to_string(),
            })?;
        Ok(Self {
            base_url: parsed,
            token,
        })
    }

    /// Read `ATTEND_API_URL` (optional) and `ATTEND_TOKEN` (required).
    ///
    /// # Errors
    ///
    /// Returns `BackendConfigError` if the token is missing or the URL is invalid.
    pub fn from_env() -> Result<Self, BackendConfigError> {
        let token = env::var("ATTEND_TOKEN").map_err(|_| BackendConfigError::MissingToken)?;
        let base_url = env::var("ATTEND_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(&base_url, token)
    }

    /// `{base}/attendance/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("attendance").extend(segments);
        }
        url
    }
}

/// `AttendanceBackend` over JSON/HTTP with bearer authentication.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `BackendConfigError::Client` if the HTTP client cannot be built.
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendConfigError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    async fn get(&self, segments: &[&str]) -> Result<Response, BackendError> {
        let url = self.config.endpoint(segments);
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl AttendanceBackend for HttpBackend {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<CreatedSession, BackendError> {
        let url = self.config.endpoint(&["generate-qr"]);
        debug!(%url, subject = request.subject(), "POST");
        let payload = GenerateQrRequest {
            subject: request.subject(),
            class_room: request.classroom(),
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn get_session_roster(&self, id: &SessionId) -> Result<SessionRoster, BackendError> {
        let response = self.get(&["session", id.as_str()]).await?;
        Ok(response.json().await?)
    }

    async fn get_report_set(&self) -> Result<ReportSet, BackendError> {
        let response = self.get(&["report"]).await?;
        Ok(response.json().await?)
    }

    async fn export_session_report(&self, id: &SessionId) -> Result<Vec<u8>, BackendError> {
        let response = self.get(&["export", id.as_str()]).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(BackendError::EmptyResult);
        }
        Ok(bytes.to_vec())
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // Error bodies are best-effort: a missing or non-JSON body still maps by status.
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message);
    Err(BackendError::from_status(status.as_u16(), message))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateQrRequest<'a> {
    subject: &'a str,
    class_room: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_blank_token() {
        assert!(matches!(
            HttpBackendConfig::new(DEFAULT_BASE_URL, "  "),
            Err(BackendConfigError::MissingToken)
        ));
    }

    #[test]
    fn config_rejects_bad_url() {
        assert!(matches!(
            HttpBackendConfig::new("not a url", "t"),
            Err(BackendConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn endpoints_join_without_double_slash() {
        let config = HttpBackendConfig::new("http://localhost:5000/api/", "t").unwrap();
        assert_eq!(
            config.endpoint(&["session", "abc"]).as_str(),
            "http://localhost:5000/api/attendance/session/abc"
        );
    }

    #[test]
    fn session_token_is_one_path_segment() {
        let config = HttpBackendConfig::new("http://localhost:5000/api", "t").unwrap();
        let id = SessionId::new("a/b?c#d");
        let url = config.endpoint(&["export", id.as_str()]);
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/attendance/export/a%2Fb%3Fc%23d"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn config_rejects_non_hierarchical_url() {
        assert!(matches!(
            HttpBackendConfig::new("mailto:staff@uni.edu", "t"),
            Err(BackendConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn generate_request_uses_wire_field_names() {
        let json = serde_json::to_value(GenerateQrRequest {
            subject: "Math",
            class_room: "Room 1",
        })
        .unwrap();
        assert_eq!(json["classRoom"], "Room 1");
    }
}
