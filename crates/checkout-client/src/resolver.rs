//! Post-Redirect Resolver
//!
//! Decides what to show when the user lands back after a redirect-based
//! checkout. An `id` in the return URL means a checkout was attempted:
//! `Processing` first, then `Succeeded` after a short delay. No `id` means
//! there is nothing to show.

use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::Result;

/// Delay between `Processing` and the resolved view
pub const DEFAULT_RESOLVE_DELAY: Duration = Duration::from_millis(1500);

/// Query parameters of the return URL
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub id: Option<String>,
    pub state: Option<String>,
}

impl RedirectParams {
    /// Parse a raw query string (`id=hp_1&state=succeeded`, leading `?` allowed)
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        match Url::parse(&format!("http://localhost/?{query}")) {
            Ok(url) => Self::from_url(&url),
            Err(_) => Self::default(),
        }
    }

    /// Read `id` and `state` from a return URL. Empty values count as absent.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "id" => params.id = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// What the return page shows
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectView {
    Processing,
    Succeeded { id: String },
    Nothing,
    Failed { message: String },
}

/// Re-checks a hosted page before the return page claims success
#[async_trait]
pub trait RedirectVerifier: Send + Sync {
    async fn is_completed(&self, hosted_page_id: &str) -> Result<bool>;
}

/// Resolves the return page's view from the redirect parameters
#[derive(Clone)]
pub struct PostRedirectResolver {
    delay: Duration,
    verifier: Option<Arc<dyn RedirectVerifier>>,
}

impl Default for PostRedirectResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PostRedirectResolver {
    pub fn new() -> Self {
        Self {
            delay: DEFAULT_RESOLVE_DELAY,
            verifier: None,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Verify the hosted page through the backend before showing success
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn RedirectVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// View shown as soon as the page loads
    pub fn initial_view(&self, params: &RedirectParams) -> RedirectView {
        if params.id.is_some() {
            RedirectView::Processing
        } else {
            RedirectView::Nothing
        }
    }

    /// Final view. Waits out the delay when an id is present.
    pub async fn resolve(&self, params: &RedirectParams) -> RedirectView {
        let Some(id) = params.id.clone() else {
            return RedirectView::Nothing;
        };

        let Some(verifier) = &self.verifier else {
            tokio::time::sleep(self.delay).await;
            return RedirectView::Succeeded { id };
        };

        let ((), verified) = tokio::join!(tokio::time::sleep(self.delay), verifier.is_completed(&id));
        match verified {
            Ok(true) => RedirectView::Succeeded { id },
            Ok(false) => {
                tracing::warn!(hosted_page_id = %id, state = ?params.state, "Returned from an incomplete checkout");
                RedirectView::Failed {
                    message: "Payment was not completed.".into(),
                }
            }
            Err(e) => {
                tracing::error!(hosted_page_id = %id, error = %e, "Could not verify checkout");
                RedirectView::Failed {
                    message: "We could not confirm your payment. Please contact support if you were charged."
                        .into(),
                }
            }
        }
    }

    /// Publish the initial view, then the resolved one, on a watch channel
    pub fn spawn(&self, params: RedirectParams) -> watch::Receiver<RedirectView> {
        let (tx, rx) = watch::channel(self.initial_view(&params));
        if params.id.is_some() {
            let resolver = self.clone();
            tokio::spawn(async move {
                let view = resolver.resolve(&params).await;
                let _ = tx.send(view);
            });
        }
        rx
    }
}
