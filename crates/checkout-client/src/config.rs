//! Client configuration

/// Hosted checkout script
pub const DEFAULT_SCRIPT_URL: &str = "https://js.chargebee.com/v2/chargebee.js";

/// Backend endpoints when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the checkout endpoints
    pub api_base_url: String,

    /// Hosted checkout site identifier; the widget cannot initialize without it
    pub site: Option<String>,

    /// URL of the external checkout script
    pub script_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.into(),
            site: None,
            script_url: DEFAULT_SCRIPT_URL.into(),
        }
    }
}

impl ClientConfig {
    /// Read `CHECKOUT_API_URL`, `CHECKOUT_SITE` and `CHECKOUT_SCRIPT_URL`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: std::env::var("CHECKOUT_API_URL").unwrap_or(defaults.api_base_url),
            site: std::env::var("CHECKOUT_SITE").ok().filter(|s| !s.trim().is_empty()),
            script_url: std::env::var("CHECKOUT_SCRIPT_URL").unwrap_or(defaults.script_url),
        }
    }

    #[must_use]
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}
