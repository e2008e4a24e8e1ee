pub mod client;
pub mod models;
pub mod outline;

pub use client::{ApiClient, ApiError};
pub use models::{ApiConfig, AuthStatus, AuthToken, SiteUrls};
