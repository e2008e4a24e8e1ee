use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// URL set for one supported site
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteUrls {
    pub base_url: String,
    /// Page that hands out the anti-forgery cookie
    pub first_url: String,
    pub login_url: String,
    pub dashboard_url: String,
}

/// Configuration for the API client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub urls: SiteUrls,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie: String,
}

fn default_csrf_cookie() -> String {
    "csrftoken".to_string()
}

impl ApiConfig {
    /// Site layout rooted at `base_url`, keeping the default headers.
    pub fn for_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            urls: SiteUrls {
                base_url: base_url.to_string(),
                first_url: format!("{}/login", base_url),
                login_url: format!("{}/user_api/v1/account/login_session/", base_url),
                dashboard_url: format!("{}/dashboard", base_url),
            },
            headers: default_headers(),
            csrf_cookie: default_csrf_cookie(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::for_base_url("https://courses.edx.org")
    }
}

fn default_headers() -> HashMap<String, String> {
    HashMap::from([
        (
            "User-Agent".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0".to_string(),
        ),
        ("Accept".to_string(), "text/html,application/xhtml+xml,*/*".to_string()),
        ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
    ])
}

/// Anti-forgery token that was accepted by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated(AuthToken),
    Unauthenticated,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated(_))
    }
}
