//! Hosted-Checkout Session Broker
//!
//! Owns the process-wide widget handle and opens checkouts with a one-shot
//! descriptor source.
//!
//! ```text
//! ensure_initialized ──▶ load script (once) ──▶ init(site) ──▶ WidgetHandle
//!                              ▲
//!   concurrent callers ────────┘  await the same in-flight future
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::{CheckoutParams, DescriptorSource, SessionProvider};
use crate::widget::{CheckoutOutcome, PendingCheckout, WidgetHandle, WidgetHost};

type InitFuture = Shared<BoxFuture<'static, Result<WidgetHandle>>>;

type SuccessCallback = Box<dyn FnOnce(String) + Send>;
type CloseCallback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Box<dyn FnOnce(String) + Send>;

/// Callbacks for [`SessionBroker::open_checkout`]. Exactly one of them fires.
#[derive(Default)]
pub struct CheckoutCallbacks {
    on_success: Option<SuccessCallback>,
    on_close: Option<CloseCallback>,
    on_error: Option<ErrorCallback>,
}

impl CheckoutCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success(mut self, f: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_close(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn dispatch(self, outcome: CheckoutOutcome) {
        match outcome {
            CheckoutOutcome::Succeeded { hosted_page_id } => {
                tracing::info!(hosted_page_id = %hosted_page_id, "Checkout successful");
                if let Some(f) = self.on_success {
                    f(hosted_page_id);
                }
            }
            CheckoutOutcome::Closed => {
                tracing::info!("Checkout closed");
                if let Some(f) = self.on_close {
                    f();
                }
            }
            CheckoutOutcome::Failed { message } => {
                tracing::error!(error = %message, "Checkout error");
                if let Some(f) = self.on_error {
                    f(message);
                }
            }
        }
    }
}

/// Brokers hosted checkout sessions between the backend and the widget
pub struct SessionBroker {
    host: Arc<dyn WidgetHost>,
    provider: Arc<dyn SessionProvider>,
    config: ClientConfig,
    init: Mutex<Option<InitFuture>>,
}

impl SessionBroker {
    pub fn new(
        host: Arc<dyn WidgetHost>,
        provider: Arc<dyn SessionProvider>,
        config: ClientConfig,
    ) -> Self {
        Self {
            host,
            provider,
            config,
            init: Mutex::new(None),
        }
    }

    /// Load the checkout script and initialize the widget, once.
    ///
    /// Concurrent callers share one in-flight initialization and observe the same
    /// handle or the same error. A settled failure is not cached: the next call
    /// starts over.
    pub async fn ensure_initialized(&self) -> Result<WidgetHandle> {
        let site = self
            .config
            .site
            .clone()
            .ok_or_else(|| ClientError::Config("CHECKOUT_SITE is not configured".into()))?;

        let init = {
            let mut slot = self.init.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(init) if !matches!(init.peek(), Some(Err(_))) => init.clone(),
                _ => {
                    let init = self.start_init(site);
                    *slot = Some(init.clone());
                    init
                }
            }
        };

        init.await
    }

    fn start_init(&self, site: String) -> InitFuture {
        let host = self.host.clone();
        let script_url = self.config.script_url.clone();

        async move {
            tracing::debug!(script = %script_url, "Loading checkout script");
            host.load_script(&script_url).await.inspect_err(|e| {
                tracing::error!(error = %e, "Checkout script failed to load");
            })?;

            let handle = host.init(&site)?;
            tracing::info!(site = %site, "Checkout widget initialized");
            Ok::<_, ClientError>(handle)
        }
        .boxed()
        .shared()
    }

    /// Open the widget for one attempt and return once it is open.
    ///
    /// The widget pulls the descriptor from a fresh one-shot source, so every call
    /// gets its own descriptor. Descriptor failures surface as
    /// [`ClientError::Descriptor`].
    pub async fn begin(&self, params: CheckoutParams) -> Result<PendingCheckout> {
        let widget = self.ensure_initialized().await?;
        let source = DescriptorSource::new(self.provider.clone(), params);
        widget.open(source).await
    }

    /// Callback flavour of [`begin`](Self::begin).
    ///
    /// Returns once the widget is open; the callbacks fire later from a spawned
    /// task. Initialization failures are returned, descriptor failures go to
    /// `on_error`.
    pub async fn open_checkout(
        &self,
        params: CheckoutParams,
        callbacks: CheckoutCallbacks,
    ) -> Result<()> {
        let widget = self.ensure_initialized().await?;
        let source = DescriptorSource::new(self.provider.clone(), params);

        match widget.open(source).await {
            Ok(pending) => {
                tokio::spawn(async move {
                    let outcome = pending.outcome().await;
                    callbacks.dispatch(outcome);
                });
            }
            Err(e) => callbacks.dispatch(CheckoutOutcome::Failed {
                message: e.user_message(),
            }),
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use checkout_payments::HostedSession;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    use crate::widget::{CheckoutReporter, CheckoutWidget};

    /// Host that counts script loads and can be told to fail them
    pub struct FakeHost {
        pub loads: AtomicUsize,
        pub fail_load: bool,
        pub widget: Arc<ScriptedWidget>,
    }

    impl FakeHost {
        pub fn new(widget: Arc<ScriptedWidget>) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail_load: false,
                widget,
            }
        }
    }

    #[async_trait]
    impl WidgetHost for FakeHost {
        async fn load_script(&self, _src: &str) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if self.fail_load {
                return Err(ClientError::Load("blocked by client".into()));
            }
            Ok(())
        }

        fn init(&self, _site: &str) -> Result<WidgetHandle> {
            Ok(self.widget.clone())
        }
    }

    /// Widget that fetches the descriptor like the real one and hands the
    /// reporter to the test
    pub struct ScriptedWidget {
        reporters: mpsc::UnboundedSender<CheckoutReporter>,
    }

    impl ScriptedWidget {
        pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<CheckoutReporter>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Arc::new(Self { reporters: tx }), rx)
        }
    }

    #[async_trait]
    impl CheckoutWidget for ScriptedWidget {
        async fn open(&self, source: DescriptorSource) -> Result<PendingCheckout> {
            let descriptor = source.fetch().await?;
            let (pending, reporter) = PendingCheckout::new(descriptor);
            let _ = self.reporters.send(reporter);
            Ok(pending)
        }
    }

    /// Session provider answering from a fixed result
    pub struct FakeProvider {
        pub calls: AtomicUsize,
        pub result: Result<HostedSession>,
    }

    impl FakeProvider {
        pub fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(HostedSession {
                    hosted_page_id: "hp_1".into(),
                    hosted_page_url: "https://acme-test.chargebee.com/pages/v3/hp_1/".into(),
                }),
            }
        }

        pub fn failing(status: u16, message: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(ClientError::Backend {
                    status,
                    message: message.into(),
                    upstream_status: None,
                }),
            }
        }
    }

    #[async_trait]
    impl SessionProvider for FakeProvider {
        async fn create_session(&self, _params: &CheckoutParams) -> Result<HostedSession> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    pub fn site_config() -> ClientConfig {
        ClientConfig::default().with_site("acme-test")
    }

    #[tokio::test]
    async fn test_concurrent_initialization_loads_once() {
        let (widget, _rx) = ScriptedWidget::new();
        let host = Arc::new(FakeHost::new(widget));
        let broker = Arc::new(SessionBroker::new(host.clone(), Arc::new(FakeProvider::ok()), site_config()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let broker = broker.clone();
                tokio::spawn(async move { broker.ensure_initialized().await })
            })
            .collect();

        let mut widgets = Vec::new();
        for handle in handles {
            widgets.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(host.loads.load(Ordering::SeqCst), 1);
        assert!(widgets.iter().all(|w| Arc::ptr_eq(w, &widgets[0])));

        broker.ensure_initialized().await.unwrap();
        assert_eq!(host.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_a_load_failure() {
        let (widget, _rx) = ScriptedWidget::new();
        let host = Arc::new(FakeHost {
            fail_load: true,
            ..FakeHost::new(widget)
        });
        let broker = SessionBroker::new(host.clone(), Arc::new(FakeProvider::ok()), site_config());

        let (a, b, c) = tokio::join!(
            broker.ensure_initialized(),
            broker.ensure_initialized(),
            broker.ensure_initialized()
        );

        for result in [a, b, c] {
            assert_eq!(result.err(), Some(ClientError::Load("blocked by client".into())));
        }
        assert_eq!(host.loads.load(Ordering::SeqCst), 1);

        // A later attempt starts over
        assert!(broker.ensure_initialized().await.is_err());
        assert_eq!(host.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_site_is_a_config_error() {
        let (widget, _rx) = ScriptedWidget::new();
        let host = Arc::new(FakeHost::new(widget));
        let broker = SessionBroker::new(host.clone(), Arc::new(FakeProvider::ok()), ClientConfig::default());

        let err = broker.ensure_initialized().await.err().unwrap();
        assert!(matches!(err, ClientError::Config(_)));
        assert_eq!(host.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_checkout_reports_success() {
        let (widget, mut reporters) = ScriptedWidget::new();
        let broker = SessionBroker::new(
            Arc::new(FakeHost::new(widget)),
            Arc::new(FakeProvider::ok()),
            site_config(),
        );

        let (tx, rx) = tokio::sync::oneshot::channel();
        broker
            .open_checkout(
                CheckoutParams::new("pro-INR-Yearly"),
                CheckoutCallbacks::new().on_success(move |id| {
                    let _ = tx.send(id);
                }),
            )
            .await
            .unwrap();

        reporters.recv().await.unwrap().succeeded("hp_1");
        assert_eq!(rx.await.unwrap(), "hp_1");
    }

    #[tokio::test]
    async fn test_descriptor_failure_fires_on_error() {
        let (widget, _rx) = ScriptedWidget::new();
        let provider = Arc::new(FakeProvider::failing(500, "site not configured"));
        let broker = SessionBroker::new(Arc::new(FakeHost::new(widget)), provider.clone(), site_config());

        let (tx, rx) = tokio::sync::oneshot::channel();
        broker
            .open_checkout(
                CheckoutParams::new("pro-INR-Yearly"),
                CheckoutCallbacks::new().on_error(move |message| {
                    let _ = tx.send(message);
                }),
            )
            .await
            .unwrap();

        assert_eq!(rx.await.unwrap(), "site not configured");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_begin_fetches_a_new_descriptor() {
        let (widget, _rx) = ScriptedWidget::new();
        let provider = Arc::new(FakeProvider::ok());
        let broker = SessionBroker::new(Arc::new(FakeHost::new(widget)), provider.clone(), site_config());

        broker.begin(CheckoutParams::new("pro")).await.unwrap();
        broker.begin(CheckoutParams::new("pro")).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
