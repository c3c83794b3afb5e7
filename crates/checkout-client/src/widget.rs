//! Checkout widget seam
//!
//! The widget itself (script, iframe, redirect) lives outside this crate. It is
//! reached through [`WidgetHost`], and reports back through a [`CheckoutReporter`]:
//! success, close and error collapse into one [`CheckoutOutcome`] that the
//! caller awaits on [`PendingCheckout`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::session::{DescriptorSource, SessionDescriptor};

/// Terminal report of an opened checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Succeeded { hosted_page_id: String },
    Closed,
    Failed { message: String },
}

/// An initialized checkout widget
#[async_trait]
pub trait CheckoutWidget: Send + Sync {
    /// Obtain a descriptor from `source` when needed, present it, and return once
    /// the checkout UI is open. Descriptor failures are returned as errors.
    async fn open(&self, source: DescriptorSource) -> Result<PendingCheckout>;
}

/// Shared handle to the initialized widget
pub type WidgetHandle = Arc<dyn CheckoutWidget>;

/// Environment that can load the checkout script and initialize the widget
#[async_trait]
pub trait WidgetHost: Send + Sync {
    /// Load the external checkout script
    async fn load_script(&self, src: &str) -> Result<()>;

    /// Initialize the widget for `site`. Called once the script is loaded.
    fn init(&self, site: &str) -> Result<WidgetHandle>;
}

/// Reporting end of an opened checkout. Dropping it without reporting counts as a close.
#[derive(Debug)]
pub struct CheckoutReporter {
    tx: oneshot::Sender<CheckoutOutcome>,
}

impl CheckoutReporter {
    pub fn report(self, outcome: CheckoutOutcome) {
        // The receiver is gone when the attempt was discarded
        let _ = self.tx.send(outcome);
    }

    pub fn succeeded(self, hosted_page_id: impl Into<String>) {
        self.report(CheckoutOutcome::Succeeded {
            hosted_page_id: hosted_page_id.into(),
        });
    }

    pub fn closed(self) {
        self.report(CheckoutOutcome::Closed);
    }

    pub fn failed(self, message: impl Into<String>) {
        self.report(CheckoutOutcome::Failed {
            message: message.into(),
        });
    }
}

/// A checkout that is open in the widget and has not finished yet
#[derive(Debug)]
pub struct PendingCheckout {
    descriptor: SessionDescriptor,
    rx: oneshot::Receiver<CheckoutOutcome>,
}

impl PendingCheckout {
    /// Pair a pending checkout with the reporter the widget keeps
    pub fn new(descriptor: SessionDescriptor) -> (Self, CheckoutReporter) {
        let (tx, rx) = oneshot::channel();
        (Self { descriptor, rx }, CheckoutReporter { tx })
    }

    /// Descriptor the widget was opened with
    pub fn descriptor(&self) -> &SessionDescriptor {
        &self.descriptor
    }

    /// Wait for the terminal report
    pub async fn outcome(self) -> CheckoutOutcome {
        self.rx.await.unwrap_or(CheckoutOutcome::Closed)
    }

    /// Wait for the terminal report, or resolve as closed once `cancel` completes
    pub async fn outcome_or_cancel(self, cancel: impl Future<Output = ()>) -> CheckoutOutcome {
        let hosted_page_id = self.descriptor.id.clone();
        tokio::select! {
            outcome = self.outcome() => outcome,
            () = cancel => {
                tracing::debug!(hosted_page_id = %hosted_page_id, "Checkout cancelled");
                CheckoutOutcome::Closed
            }
        }
    }
}
