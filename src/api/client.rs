use futures::Stream;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{ApiConfig, AuthStatus, AuthToken};

const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Authenticated transport shared by every component of a session.
///
/// Clones share one cookie jar, so a login performed through any clone
/// is visible to all of them.
#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidConfig(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidConfig(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Two-step login: fetch the anti-forgery cookie, then post credentials.
    ///
    /// Only a 200 on the POST counts as success. Transport errors are logged
    /// and reported as `Unauthenticated`.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthStatus {
        match self.try_authenticate(username, password).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "login request failed");
                AuthStatus::Unauthenticated
            }
        }
    }

    async fn try_authenticate(&self, username: &str, password: &str) -> Result<AuthStatus> {
        let response = self.http.get(&self.config.urls.first_url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "login page unavailable");
            return Ok(AuthStatus::Unauthenticated);
        }

        let csrf_token = response
            .cookies()
            .find(|cookie| cookie.name() == self.config.csrf_cookie)
            .map(|cookie| cookie.value().to_string());
        let Some(csrf_token) = csrf_token else {
            warn!(cookie = %self.config.csrf_cookie, "login page did not set an anti-forgery cookie");
            return Ok(AuthStatus::Unauthenticated);
        };

        let response = self
            .http
            .post(&self.config.urls.login_url)
            .header(CSRF_HEADER, &csrf_token)
            .form(&[("email", username), ("password", password)])
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            info!("login accepted");
            Ok(AuthStatus::Authenticated(AuthToken(csrf_token)))
        } else {
            warn!(status = %response.status(), "login rejected");
            Ok(AuthStatus::Unauthenticated)
        }
    }

    /// Fetch the dashboard page listing the enrolled courses
    pub async fn fetch_dashboard(&self) -> Result<String> {
        let response = self
            .http
            .get(&self.config.urls.dashboard_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Dashboard request failed: {}", e)))?;

        Ok(response.text().await?)
    }

    /// GET a page body. A non-success status yields `None` rather than an error.
    pub async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "page unavailable");
            return Ok(None);
        }

        Ok(Some(response.text().await?))
    }

    /// Content type reported by a HEAD request, following redirects
    pub async fn content_type(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .http
            .head(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("HEAD request failed: {}", e)))?;

        Ok(response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string))
    }

    /// Stream a file body.
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        download_url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .http
            .get(download_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Download request failed: {}", e)))?;

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}
