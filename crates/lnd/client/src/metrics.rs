//! Adapter metrics

use metrics::Counter;

/// Counters for subscription traffic and outgoing payments.
#[derive(Clone, Debug)]
pub struct LndMetrics {
    /// Number of custom messages received from peers
    pub(crate) custom_messages_total: Counter,
    /// Number of message handler invocations that failed or panicked
    pub(crate) handler_failures_total: Counter,
    /// Number of settled invoices seen on the invoice subscription
    pub(crate) invoices_settled_total: Counter,
    /// Number of peer online transitions
    pub(crate) peers_online_total: Counter,
    /// Number of streaming payments that succeeded
    pub(crate) payments_succeeded_total: Counter,
    /// Number of streaming payments that failed
    pub(crate) payments_failed_total: Counter,
    /// Number of subscription runners that exited
    pub(crate) runner_exits_total: Counter,
}

impl Default for LndMetrics {
    fn default() -> Self {
        Self {
            custom_messages_total: metrics::counter!("lnd.custom_messages_total"),
            handler_failures_total: metrics::counter!("lnd.dispatch.handler_failures_total"),
            invoices_settled_total: metrics::counter!("lnd.invoices.settled_total"),
            peers_online_total: metrics::counter!("lnd.peers.online_total"),
            payments_succeeded_total: metrics::counter!("lnd.payments.succeeded_total"),
            payments_failed_total: metrics::counter!("lnd.payments.failed_total"),
            runner_exits_total: metrics::counter!("lnd.listener.runner_exits_total"),
        }
    }
}

impl LndMetrics {
    pub(crate) fn inc_custom_messages(&self) {
        self.custom_messages_total.increment(1);
    }

    pub(crate) fn inc_handler_failures(&self, failures: usize) {
        self.handler_failures_total.increment(failures as u64);
    }

    pub(crate) fn inc_invoices_settled(&self) {
        self.invoices_settled_total.increment(1);
    }

    pub(crate) fn inc_peers_online(&self) {
        self.peers_online_total.increment(1);
    }

    pub(crate) fn inc_payments_succeeded(&self) {
        self.payments_succeeded_total.increment(1);
    }

    pub(crate) fn inc_payments_failed(&self) {
        self.payments_failed_total.increment(1);
    }

    pub(crate) fn inc_runner_exits(&self) {
        self.runner_exits_total.increment(1);
    }
}
