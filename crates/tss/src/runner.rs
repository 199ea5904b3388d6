//! Drives a [`Party`] to completion over a [`NetworkBridge`].
//!
//! ```text
//!  bridge.receive() ──inbound──► computation (blocking worker) ──outbound──► bridge.send()
//! ```
//!
//! The computation runs on a blocking worker and talks to the async side
//! only through two channels, so inbound delivery and outbound sends never
//! wait on each other or on a long `feed`. When the deadline expires both
//! channels are closed and the worker stops at its next channel operation.

use tracing::{debug, warn};

use crate::bridge::{NetworkBridge, ProtocolMessages};
use crate::deadline::ExecutionDeadline;
use crate::error::{BoxError, TssError};
use crate::message::ProtocolMessage;
use crate::party::{OutboundMessage, Party, PartyError};
use crate::transport::TransportError;

/// Why a drive did not produce an output.
#[derive(Debug)]
pub(crate) enum DriveError {
    /// The execution deadline passed.
    Expired,
    /// The party failed, or the worker was lost.
    Protocol(BoxError),
    /// Sending or receiving failed.
    Network(TssError),
}

impl From<PartyError> for DriveError {
    fn from(err: PartyError) -> Self {
        match err {
            PartyError::Failure(source) => Self::Protocol(source),
            other => Self::Protocol(Box::new(other)),
        }
    }
}

pub(crate) async fn drive<P: Party>(
    party: P,
    bridge: &NetworkBridge,
    deadline: &ExecutionDeadline,
) -> Result<P::Output, DriveError> {
    let (inbound_tx, inbound_rx) = async_channel::unbounded::<ProtocolMessage>();
    let (outbound_tx, outbound_rx) = async_channel::unbounded::<OutboundMessage>();

    let mut computation =
        tokio::task::spawn_blocking(move || compute(party, inbound_rx, outbound_tx));

    let inbound = forward_inbound(bridge.receive(), inbound_tx.clone());
    let outbound = forward_outbound(bridge, outbound_rx.clone());

    let execution = async {
        tokio::pin!(inbound);
        tokio::pin!(outbound);
        let mut flushed = false;

        loop {
            tokio::select! {
                joined = &mut computation => {
                    let output = joined.map_err(|e| DriveError::Protocol(Box::new(e)))??;
                    if !flushed {
                        // The worker dropped its sender; deliver what is queued.
                        (&mut outbound).await?;
                    }
                    return Ok(output);
                }
                sent = &mut outbound, if !flushed => {
                    sent?;
                    flushed = true;
                }
                _ = &mut inbound => {
                    return Err(DriveError::Network(TssError::Transport(
                        TransportError::ChannelClosed,
                    )));
                }
            }
        }
    };

    let result: Option<Result<P::Output, DriveError>> = deadline.run(execution).await;

    inbound_tx.close();
    outbound_rx.close();

    result.unwrap_or(Err(DriveError::Expired))
}

/// Runs on the blocking worker.
fn compute<P: Party>(
    mut party: P,
    inbound: async_channel::Receiver<ProtocolMessage>,
    outbound: async_channel::Sender<OutboundMessage>,
) -> Result<P::Output, DriveError> {
    party.start()?;
    flush(&mut party, &outbound)?;

    while !party.is_complete() {
        let message = inbound.recv_blocking().map_err(|_| DriveError::Expired)?;
        match party.feed(message) {
            Ok(()) => {}
            Err(PartyError::UnexpectedMessage { sender, reason }) => {
                warn!("Party rejected message from {}: {}", sender, reason);
            }
            Err(err) => return Err(err.into()),
        }
        flush(&mut party, &outbound)?;
    }

    party.result().map_err(DriveError::from)
}

fn flush<P: Party>(
    party: &mut P,
    outbound: &async_channel::Sender<OutboundMessage>,
) -> Result<(), DriveError> {
    for message in party.drain_outbound() {
        outbound
            .send_blocking(message)
            .map_err(|_| DriveError::Expired)?;
    }
    Ok(())
}

/// Completes only if the bridge stream ends.
async fn forward_inbound(
    messages: ProtocolMessages,
    inbound: async_channel::Sender<ProtocolMessage>,
) {
    while let Ok(message) = messages.recv().await {
        if inbound.send(message).await.is_err() {
            // The worker is gone; keep the bridge stream alive until the
            // caller stops polling.
            return std::future::pending().await;
        }
    }
}

/// Completes once the worker has dropped its sender and the queue is empty.
async fn forward_outbound(
    bridge: &NetworkBridge,
    outbound: async_channel::Receiver<OutboundMessage>,
) -> Result<(), DriveError> {
    while let Ok(message) = outbound.recv().await {
        debug!("Forwarding {} byte message to {:?}", message.payload.len(), message.target);
        bridge
            .send(message.payload, message.target)
            .await
            .map_err(DriveError::Network)?;
    }
    Ok(())
}
