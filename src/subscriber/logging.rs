use super::{Event, EventKind, Subscriber};

/// Subscriber that reports every event through `tracing`.
///
/// Failures and discarded incomes are logged at `warn`, transitions and
/// termination at `info`, everything else at `debug`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    pub fn new() -> Self {
        Self
    }
}

impl Subscriber for LoggingSubscriber {
    fn notify(&self, event: &Event) {
        let machine = event.machine.to_string();
        let machine = machine.as_str();
        let state = event.state.as_str();

        match &event.kind {
            EventKind::Started => tracing::debug!(machine, state, "machine started"),
            EventKind::Entered => tracing::debug!(machine, state, "income entered"),
            EventKind::Deferred => tracing::debug!(machine, state, "income deferred"),
            EventKind::Recalled => tracing::debug!(machine, state, "deferred income recalled"),
            EventKind::Outcome => tracing::debug!(machine, state, "outcome produced"),
            EventKind::Failed { error } => {
                tracing::warn!(machine, state, error = error.as_str(), "state failed")
            }
            EventKind::Transitioned { to, trigger } => tracing::info!(
                machine,
                from = state,
                to = to.as_str(),
                trigger = trigger.as_deref().unwrap_or("-"),
                "transitioned"
            ),
            EventKind::Terminated { reason, discarded } => tracing::info!(
                machine,
                state,
                %reason,
                discarded,
                "machine terminated"
            ),
            EventKind::Discarded { count } => {
                tracing::warn!(machine, state, count, "deferred incomes discarded")
            }
        }
    }
}
