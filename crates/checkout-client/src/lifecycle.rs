//! Checkout Lifecycle Controller
//!
//! ```text
//! Idle ──Start──▶ SessionRequested ──WidgetOpened──▶ AwaitingCompletion
//!                        │                                 │
//!                  DescriptorFailed          Completed(success|close|error)
//!                        ▼                                 ▼
//!                      Failed              Succeeded | Cancelled | Failed
//! ```
//!
//! A controller tracks exactly one attempt. Terminal states accept no events; a
//! retry is a new controller with a new attempt.

use uuid::Uuid;

use crate::broker::SessionBroker;
use crate::error::{ClientError, Result};
use crate::session::{CheckoutParams, SessionDescriptor};
use crate::widget::CheckoutOutcome;

/// Lifecycle state of a checkout attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    SessionRequested,
    AwaitingCompletion,
    Succeeded { hosted_page_id: String },
    Failed { message: String },
    Cancelled,
}

impl CheckoutState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Succeeded { .. } | CheckoutState::Failed { .. } | CheckoutState::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "idle",
            CheckoutState::SessionRequested => "session_requested",
            CheckoutState::AwaitingCompletion => "awaiting_completion",
            CheckoutState::Succeeded { .. } => "succeeded",
            CheckoutState::Failed { .. } => "failed",
            CheckoutState::Cancelled => "cancelled",
        }
    }
}

/// Events driving the lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// User started the checkout
    Start,
    /// Widget obtained a descriptor and is showing the checkout
    WidgetOpened(SessionDescriptor),
    /// No descriptor could be obtained, or the widget failed to open
    DescriptorFailed(String),
    /// Widget reported a terminal outcome
    Completed(CheckoutOutcome),
}

impl CheckoutEvent {
    fn name(&self) -> &'static str {
        match self {
            CheckoutEvent::Start => "start",
            CheckoutEvent::WidgetOpened(_) => "widget_opened",
            CheckoutEvent::DescriptorFailed(_) => "descriptor_failed",
            CheckoutEvent::Completed(_) => "completed",
        }
    }
}

/// One user's progress through checkout
#[derive(Clone, Debug)]
pub struct CheckoutAttempt {
    pub id: Uuid,
    pub params: CheckoutParams,
    descriptor: Option<SessionDescriptor>,
}

impl CheckoutAttempt {
    pub fn new(params: CheckoutParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            params,
            descriptor: None,
        }
    }

    /// Descriptor issued for this attempt, if any
    pub fn descriptor(&self) -> Option<&SessionDescriptor> {
        self.descriptor.as_ref()
    }

    fn record_descriptor(&mut self, descriptor: SessionDescriptor) -> Result<()> {
        if self.descriptor.is_some() {
            return Err(ClientError::DescriptorAlreadyIssued);
        }
        self.descriptor = Some(descriptor);
        Ok(())
    }
}

/// State machine for a single checkout attempt
#[derive(Debug)]
pub struct CheckoutController {
    attempt: CheckoutAttempt,
    state: CheckoutState,
}

impl CheckoutController {
    pub fn new(params: CheckoutParams) -> Self {
        Self {
            attempt: CheckoutAttempt::new(params),
            state: CheckoutState::Idle,
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn attempt(&self) -> &CheckoutAttempt {
        &self.attempt
    }

    /// Apply an event. Invalid events are rejected and leave the state unchanged.
    pub fn apply(&mut self, event: CheckoutEvent) -> Result<&CheckoutState> {
        let event_name = event.name();
        let next = match (&self.state, event) {
            (CheckoutState::Idle, CheckoutEvent::Start) => CheckoutState::SessionRequested,
            (CheckoutState::SessionRequested, CheckoutEvent::WidgetOpened(descriptor)) => {
                self.attempt.record_descriptor(descriptor)?;
                CheckoutState::AwaitingCompletion
            }
            (CheckoutState::SessionRequested, CheckoutEvent::DescriptorFailed(message)) => {
                CheckoutState::Failed { message }
            }
            (CheckoutState::AwaitingCompletion, CheckoutEvent::Completed(outcome)) => match outcome {
                CheckoutOutcome::Succeeded { hosted_page_id } => {
                    CheckoutState::Succeeded { hosted_page_id }
                }
                CheckoutOutcome::Closed => CheckoutState::Cancelled,
                CheckoutOutcome::Failed { message } => CheckoutState::Failed { message },
            },
            (state, _) => {
                tracing::warn!(
                    attempt = %self.attempt.id,
                    state = state.name(),
                    event = event_name,
                    "Rejected checkout event"
                );
                return Err(ClientError::InvalidTransition {
                    from: state.name(),
                    event: event_name,
                });
            }
        };

        tracing::debug!(
            attempt = %self.attempt.id,
            from = self.state.name(),
            to = next.name(),
            "Checkout transition"
        );
        self.state = next;
        Ok(&self.state)
    }

    /// Drive the attempt to a terminal state. Every failure ends in `Failed`
    /// with a displayable message; nothing is retried.
    pub async fn run(mut self, broker: &SessionBroker) -> CheckoutState {
        if let Err(e) = self.apply(CheckoutEvent::Start) {
            tracing::warn!(error = %e, "Checkout attempt already started");
            return self.state;
        }

        let pending = match broker.begin(self.attempt.params.clone()).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(attempt = %self.attempt.id, error = %e, "Checkout could not be opened");
                let _ = self.apply(CheckoutEvent::DescriptorFailed(e.user_message()));
                return self.state;
            }
        };

        if let Err(e) = self.apply(CheckoutEvent::WidgetOpened(pending.descriptor().clone())) {
            let _ = self.apply(CheckoutEvent::DescriptorFailed(e.user_message()));
            return self.state;
        }

        let outcome = pending.outcome().await;
        let _ = self.apply(CheckoutEvent::Completed(outcome));

        tracing::info!(attempt = %self.attempt.id, state = self.state.name(), "Checkout attempt finished");
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::broker::tests::{site_config, FakeHost, FakeProvider, ScriptedWidget};
    use crate::session::{CHECKOUT_NEW, STATE_CREATED};

    fn descriptor(id: &str) -> SessionDescriptor {
        SessionDescriptor {
            id: id.into(),
            kind: CHECKOUT_NEW.into(),
            url: format!("https://acme-test.chargebee.com/pages/v3/{id}/"),
            state: STATE_CREATED.into(),
            embed: true,
        }
    }

    fn awaiting() -> CheckoutController {
        let mut controller = CheckoutController::new(CheckoutParams::new("pro-INR-Yearly"));
        controller.apply(CheckoutEvent::Start).unwrap();
        controller.apply(CheckoutEvent::WidgetOpened(descriptor("hp_1"))).unwrap();
        controller
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut controller = awaiting();
        assert_eq!(controller.state(), &CheckoutState::AwaitingCompletion);
        assert_eq!(controller.attempt().descriptor().unwrap().id, "hp_1");

        let state = controller
            .apply(CheckoutEvent::Completed(CheckoutOutcome::Succeeded {
                hosted_page_id: "hp_1".into(),
            }))
            .unwrap();
        assert_eq!(state, &CheckoutState::Succeeded { hosted_page_id: "hp_1".into() });
    }

    #[test]
    fn test_close_is_cancelled_not_failed() {
        let mut controller = awaiting();
        controller
            .apply(CheckoutEvent::Completed(CheckoutOutcome::Closed))
            .unwrap();
        assert_eq!(controller.state(), &CheckoutState::Cancelled);
    }

    #[test]
    fn test_descriptor_failure_goes_straight_to_failed() {
        let mut controller = CheckoutController::new(CheckoutParams::new("pro"));
        controller.apply(CheckoutEvent::Start).unwrap();
        controller
            .apply(CheckoutEvent::DescriptorFailed("site not configured".into()))
            .unwrap();
        assert_eq!(
            controller.state(),
            &CheckoutState::Failed { message: "site not configured".into() }
        );
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        let events = [
            CheckoutEvent::Start,
            CheckoutEvent::WidgetOpened(descriptor("hp_2")),
            CheckoutEvent::DescriptorFailed("late".into()),
            CheckoutEvent::Completed(CheckoutOutcome::Closed),
            CheckoutEvent::Completed(CheckoutOutcome::Succeeded { hosted_page_id: "hp_2".into() }),
        ];

        for outcome in [
            CheckoutOutcome::Succeeded { hosted_page_id: "hp_1".into() },
            CheckoutOutcome::Closed,
            CheckoutOutcome::Failed { message: "declined".into() },
        ] {
            let mut controller = awaiting();
            controller.apply(CheckoutEvent::Completed(outcome)).unwrap();
            let terminal = controller.state().clone();
            assert!(terminal.is_terminal());

            for event in events.clone() {
                let err = controller.apply(event).unwrap_err();
                assert!(matches!(err, ClientError::InvalidTransition { .. }));
                assert_eq!(controller.state(), &terminal);
            }
        }
    }

    #[test]
    fn test_out_of_order_events_are_rejected() {
        let mut controller = CheckoutController::new(CheckoutParams::new("pro"));
        assert!(controller
            .apply(CheckoutEvent::Completed(CheckoutOutcome::Closed))
            .is_err());
        assert!(controller.apply(CheckoutEvent::WidgetOpened(descriptor("hp_1"))).is_err());
        assert_eq!(controller.state(), &CheckoutState::Idle);
    }

    #[test]
    fn test_fresh_attempts_get_fresh_ids() {
        let a = CheckoutController::new(CheckoutParams::new("pro"));
        let b = CheckoutController::new(CheckoutParams::new("pro"));
        assert_ne!(a.attempt().id, b.attempt().id);
        assert!(a.attempt().descriptor().is_none());
    }

    #[tokio::test]
    async fn test_run_reaches_succeeded() {
        let (widget, mut reporters) = ScriptedWidget::new();
        let broker = SessionBroker::new(
            Arc::new(FakeHost::new(widget)),
            Arc::new(FakeProvider::ok()),
            site_config(),
        );

        let run = CheckoutController::new(CheckoutParams::new("pro-INR-Yearly")).run(&broker);
        let report = async {
            reporters.recv().await.unwrap().succeeded("hp_1");
        };
        let (state, ()) = tokio::join!(run, report);

        assert_eq!(state, CheckoutState::Succeeded { hosted_page_id: "hp_1".into() });
    }

    #[tokio::test]
    async fn test_run_maps_widget_close_to_cancelled() {
        let (widget, mut reporters) = ScriptedWidget::new();
        let broker = SessionBroker::new(
            Arc::new(FakeHost::new(widget)),
            Arc::new(FakeProvider::ok()),
            site_config(),
        );

        let run = CheckoutController::new(CheckoutParams::new("pro")).run(&broker);
        let report = async {
            drop(reporters.recv().await.unwrap());
        };
        let (state, ()) = tokio::join!(run, report);

        assert_eq!(state, CheckoutState::Cancelled);
    }

    #[tokio::test]
    async fn test_run_fails_when_session_endpoint_errors() {
        let (widget, _reporters) = ScriptedWidget::new();
        let broker = SessionBroker::new(
            Arc::new(FakeHost::new(widget)),
            Arc::new(FakeProvider::failing(500, "site not configured")),
            site_config(),
        );

        let state = CheckoutController::new(CheckoutParams::new("pro")).run(&broker).await;
        assert_eq!(state, CheckoutState::Failed { message: "site not configured".into() });
    }

    #[tokio::test]
    async fn test_run_surfaces_backend_reason_from_session_endpoint() {
        use crate::api::BackendClient;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/hosted-checkout"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "error": "site not configured" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (widget, _reporters) = ScriptedWidget::new();
        let broker = SessionBroker::new(
            Arc::new(FakeHost::new(widget)),
            Arc::new(BackendClient::new(format!("{}/api", server.uri()))),
            site_config(),
        );

        let state = CheckoutController::new(CheckoutParams::new("pro-INR-Yearly")).run(&broker).await;
        assert_eq!(state, CheckoutState::Failed { message: "site not configured".into() });
    }

    #[tokio::test]
    async fn test_run_fails_when_script_is_blocked() {
        let (widget, _reporters) = ScriptedWidget::new();
        let host = FakeHost {
            fail_load: true,
            ..FakeHost::new(widget)
        };
        let broker = SessionBroker::new(Arc::new(host), Arc::new(FakeProvider::ok()), site_config());

        let state = CheckoutController::new(CheckoutParams::new("pro")).run(&broker).await;
        assert!(matches!(state, CheckoutState::Failed { .. }));
    }
}
