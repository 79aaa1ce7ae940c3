use std::time::Duration;

/// Resolution service used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://tools.freezone.sbs/docs/index.php";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Resolution endpoint that receives the source url as a form POST.
    pub endpoint: String,
    /// Name of the form field carrying the source url.
    pub form_field: String,
    pub resolve_timeout: Duration,
    /// Applies to the response headers and to each body chunk of a download.
    pub download_timeout: Duration,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            form_field: "q".to_string(),
            resolve_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
