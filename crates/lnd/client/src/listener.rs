//! Long-running subscriptions to the node.
//!
//! Three runners are started together, one per stream: settled invoices go to
//! the payment callback, custom messages go to the [`Registry`], and peers
//! coming online go to the [`PresenceTrigger`]. All of them stop when the
//! shared [`CancellationToken`] fires. A runner whose stream fails or ends
//! returns the error to its owner and is not restarted here.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dispatch::Registry;
use crate::error::ListenError;
use crate::metrics::LndMetrics;
use crate::node::{
    InvoiceState, InvoiceUpdate, NodeClient, NodeStream, PeerEventKind, PeerEventUpdate,
    RawCustomMessage, RpcResult,
};
use crate::presence::PresenceTrigger;
use crate::primitives::{InboundMessage, NodeId};

/// Identifies one of the subscription runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Runner {
    Invoices,
    CustomMessages,
    PeerEvents,
}

/// How a runner ended.
#[derive(Debug)]
pub struct RunnerOutcome {
    pub runner: Runner,
    pub result: Result<(), ListenError>,
}

/// Owns the running subscriptions.
///
/// Dropping the handle does not stop the runners; call [`shutdown`] or shut
/// down the session that started them.
///
/// [`shutdown`]: ListenerHandle::shutdown
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: CancellationToken,
    tasks: Vec<(Runner, JoinHandle<Result<(), ListenError>>)>,
}

impl ListenerHandle {
    /// Signals every runner to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Waits for all runners to finish and reports how each one ended.
    pub async fn join(self) -> Vec<RunnerOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (runner, task) in self.tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => Err(ListenError::Aborted {
                    runner,
                    reason: err.to_string(),
                }),
            };
            outcomes.push(RunnerOutcome { runner, result });
        }
        outcomes
    }
}

/// Shared state of the three runners.
pub(crate) struct Listener<N> {
    node: Arc<N>,
    registry: Registry,
    presence: Option<Arc<dyn PresenceTrigger>>,
    metrics: LndMetrics,
}

impl<N> Clone for Listener<N> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            registry: self.registry.clone(),
            presence: self.presence.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<N: NodeClient + 'static> Listener<N> {
    pub(crate) fn new(
        node: Arc<N>,
        registry: Registry,
        presence: Option<Arc<dyn PresenceTrigger>>,
        metrics: LndMetrics,
    ) -> Self {
        Self {
            node,
            registry,
            presence,
            metrics,
        }
    }

    /// Spawns the three runners on the current runtime.
    pub(crate) fn start(self, cancel: CancellationToken) -> ListenerHandle {
        let tasks = vec![
            (
                Runner::Invoices,
                self.spawn(Runner::Invoices, &cancel, |this, cancel| async move {
                    this.run_invoices(&cancel).await
                }),
            ),
            (
                Runner::CustomMessages,
                self.spawn(Runner::CustomMessages, &cancel, |this, cancel| async move {
                    this.run_custom_messages(&cancel).await
                }),
            ),
            (
                Runner::PeerEvents,
                self.spawn(Runner::PeerEvents, &cancel, |this, cancel| async move {
                    this.run_peer_events(&cancel).await
                }),
            ),
        ];
        info!("started lnd subscriptions");
        ListenerHandle { cancel, tasks }
    }

    fn spawn<F, Fut>(
        &self,
        runner: Runner,
        cancel: &CancellationToken,
        run: F,
    ) -> JoinHandle<Result<(), ListenError>>
    where
        F: FnOnce(Self, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), ListenError>> + Send + 'static,
    {
        let metrics = self.metrics.clone();
        let fut = run(self.clone(), cancel.clone());
        tokio::spawn(
            async move {
                let result = fut.await;
                match &result {
                    Ok(()) => debug!("runner stopped"),
                    Err(err) => warn!("runner terminated: {err}"),
                }
                metrics.inc_runner_exits();
                result
            }
            .instrument(info_span!("lnd_runner", %runner)),
        )
    }

    /// Hands the memo of every settled invoice to the payment callback.
    pub(crate) async fn run_invoices(&self, cancel: &CancellationToken) -> Result<(), ListenError> {
        let runner = Runner::Invoices;
        let Some(stream) = open(runner, cancel, self.node.subscribe_invoices()).await? else {
            return Ok(());
        };
        drive(runner, stream, cancel, |invoice: InvoiceUpdate| {
            if invoice.state != InvoiceState::Settled {
                return;
            }
            debug!(memo = %invoice.memo, "invoice settled");
            self.metrics.inc_invoices_settled();
            self.registry.notify_settled(&invoice.memo);
        })
        .await
    }

    /// Dispatches every custom message to the registered handlers.
    pub(crate) async fn run_custom_messages(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ListenError> {
        let runner = Runner::CustomMessages;
        let Some(stream) = open(runner, cancel, self.node.subscribe_custom_messages()).await?
        else {
            return Ok(());
        };
        drive(runner, stream, cancel, |msg: RawCustomMessage| {
            let peer = match NodeId::from_slice(&msg.peer) {
                Ok(peer) => peer,
                Err(err) => {
                    warn!(peer = %hex::encode(&msg.peer), "skipping custom message: {err}");
                    return;
                }
            };
            self.metrics.inc_custom_messages();
            let inbound = InboundMessage::new(peer, msg.msg_type, msg.data);
            debug!(%peer, msg_type = %inbound.msg_type, len = inbound.payload.len(), "custom message");
            self.registry.dispatch(&inbound);
        })
        .await
    }

    /// Triggers a presence poll for every peer that comes online.
    pub(crate) async fn run_peer_events(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ListenError> {
        let runner = Runner::PeerEvents;
        let Some(stream) = open(runner, cancel, self.node.subscribe_peer_events()).await? else {
            return Ok(());
        };
        drive(runner, stream, cancel, |event: PeerEventUpdate| {
            if event.kind != PeerEventKind::Online {
                return;
            }
            let peer = match event.pub_key.parse::<NodeId>() {
                Ok(peer) => peer,
                Err(err) => {
                    warn!(pub_key = %event.pub_key, "skipping peer event: {err}");
                    return;
                }
            };
            debug!(%peer, "peer online");
            self.metrics.inc_peers_online();
            if let Some(presence) = &self.presence {
                presence.poll(&peer);
            }
        })
        .await
    }
}

/// Opens a subscription. Returns `None` if cancelled first.
async fn open<T>(
    runner: Runner,
    cancel: &CancellationToken,
    subscribe: impl Future<Output = RpcResult<NodeStream<T>>>,
) -> Result<Option<NodeStream<T>>, ListenError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        res = subscribe => res
            .map(Some)
            .map_err(|status| ListenError::Subscribe { runner, status }),
    }
}

/// Feeds stream items to `on_item` in order until cancelled or the stream
/// fails. The stream is dropped on return.
async fn drive<T>(
    runner: Runner,
    mut stream: NodeStream<T>,
    cancel: &CancellationToken,
    mut on_item: impl FnMut(T),
) -> Result<(), ListenError> {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%runner, "subscription cancelled");
                return Ok(());
            }
            item = stream.next() => match item {
                Some(Ok(item)) => on_item(item),
                Some(Err(status)) => return Err(ListenError::Stream { runner, status }),
                None => return Err(ListenError::StreamEnded { runner }),
            },
        }
    }
}
