//! Outgoing payments and channel capacity checks.

use std::time::Duration;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::{LndError, Result};
use crate::node::{ChannelInfo, NodeClient, NodeStream, PaymentParams, PaymentStatus, PaymentUpdate};
use crate::primitives::ShortChannelId;

/// Wait between two non-terminal payment updates.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timeout handed to the node for a streaming payment.
pub const PAYMENT_TIMEOUT_SECS: u32 = 30;

/// Maximum number of parts of a streaming payment.
pub const MAX_PAYMENT_PARTS: u32 = 30;

/// Looks up an active channel and checks it can send `amount_sat`.
///
/// `short_channel_id` may use any encoding [`ShortChannelId`] parses. An id
/// that does not parse matches no channel.
pub async fn check_channel<N: NodeClient + ?Sized>(
    node: &N,
    short_channel_id: &str,
    amount_sat: u64,
) -> Result<ChannelInfo> {
    let not_found = || LndError::ChannelNotFound(short_channel_id.to_string());
    let scid: ShortChannelId = short_channel_id.parse().map_err(|_| not_found())?;

    let channel = node
        .list_channels(true)
        .await?
        .into_iter()
        .find(|channel| channel.short_channel_id == scid)
        .ok_or_else(not_found)?;

    if channel.local_balance < amount_sat {
        return Err(LndError::InsufficientCapacity {
            short_channel_id: scid.to_string(),
            local_balance: channel.local_balance,
            required: amount_sat,
        });
    }
    Ok(channel)
}

/// Pays `pay_req` in a single blocking call and returns the preimage as hex.
pub async fn pay_invoice<N: NodeClient + ?Sized>(node: &N, pay_req: &str) -> Result<String> {
    let payment = node.pay(pay_req).await?;
    if !payment.payment_error.is_empty() {
        return Err(LndError::PaymentFailed(payment.payment_error));
    }
    Ok(hex::encode(payment.preimage))
}

/// Pays `pay_req` through the given channel only.
///
/// The channel must have enough local balance for the invoice amount; no
/// payment is attempted otherwise. Returns the preimage as hex.
pub async fn rebalance_payment<N: NodeClient + ?Sized>(
    node: &N,
    pay_req: &str,
    short_channel_id: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    let decoded = node.decode_pay_req(pay_req).await?;
    let channel = check_channel(node, short_channel_id, decoded.amount_sat_ceil()).await?;

    info!(
        short_channel_id = %channel.short_channel_id,
        chan_id = channel.chan_id,
        amount_sat = decoded.amount_sat_ceil(),
        "sending channel-scoped payment"
    );
    let stream = node
        .send_payment(PaymentParams {
            payment_request: pay_req.to_string(),
            timeout_seconds: PAYMENT_TIMEOUT_SECS,
            outgoing_chan_ids: vec![channel.chan_id],
            max_parts: MAX_PAYMENT_PARTS,
        })
        .await?;

    await_payment(stream, cancel, POLL_INTERVAL).await
}

/// Reads payment updates until the first terminal status.
///
/// Sleeps `interval` after every non-terminal update. Cancellation is
/// observed while waiting for an update and while sleeping.
pub async fn await_payment(
    mut updates: NodeStream<PaymentUpdate>,
    cancel: &CancellationToken,
    interval: Duration,
) -> Result<String> {
    loop {
        let update = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LndError::Cancelled),
            update = updates.next() => match update {
                Some(Ok(update)) => update,
                Some(Err(status)) => return Err(LndError::Stream(status)),
                None => return Err(LndError::StreamEnded),
            },
        };

        if !update.status.is_terminal() {
            trace!(payment_hash = %update.payment_hash, status = ?update.status, "payment pending");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LndError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
            continue;
        }

        return match update.status {
            PaymentStatus::Failed { reason } => {
                debug!(payment_hash = %update.payment_hash, %reason, "payment failed");
                Err(LndError::PaymentFailed(reason))
            }
            _ => {
                debug!(payment_hash = %update.payment_hash, "payment succeeded");
                Ok(update.preimage)
            }
        };
    }
}
