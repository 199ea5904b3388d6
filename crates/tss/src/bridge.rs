//! Binding of one execution to the transport.
//!
//! A [`NetworkBridge`] subscribes for the execution's group id and runs a
//! dispatcher task that screens every inbound envelope before it reaches the
//! computation:
//!
//! - envelopes for another group, from non-members or from the local member
//!   are discarded;
//! - undecodable envelopes and unknown type tags are discarded;
//! - the sender claimed in the envelope must match the transport sender;
//! - an exact duplicate of a delivered protocol message is discarded.
//!
//! Discards are logged as [`TssError::UnexpectedMessage`] and never stop the
//! stream. Join and announce signals go to the join barrier, protocol
//! messages to [`NetworkBridge::receive`]. Order is kept per sender.

use std::collections::HashSet;
use std::sync::Arc;

use common::{EventType, LogEvent};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{TssError, TssResult};
use crate::group::{GroupInfo, MemberId};
use crate::message::{AnnounceMessage, Envelope, JoinMessage, ProtocolMessage};
use crate::transport::{InboundEnvelope, Subscription, Transport};

/// Capacity of the join/announce signal queue. Signals beyond it are dropped.
const SIGNAL_QUEUE_CAPACITY: usize = 256;

/// Destination of an outbound protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Broadcast,
    Member(MemberId),
}

/// A join barrier signal received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerSignal {
    Join(MemberId),
    Announce(MemberId),
}

impl PeerSignal {
    pub fn sender(&self) -> &MemberId {
        match self {
            Self::Join(sender) | Self::Announce(sender) => sender,
        }
    }
}

/// Inbound protocol messages of one execution. Implements `futures::Stream`.
pub type ProtocolMessages = async_channel::Receiver<ProtocolMessage>;

pub struct NetworkBridge {
    group: Arc<GroupInfo>,
    transport: Arc<dyn Transport>,
    messages: ProtocolMessages,
    signals: async_channel::Receiver<PeerSignal>,
    shutdown: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
}

impl NetworkBridge {
    /// Subscribe for `group` and start dispatching inbound traffic.
    pub fn connect(group: Arc<GroupInfo>, transport: Arc<dyn Transport>) -> TssResult<Self> {
        if transport.local_member() != group.member_id() {
            return Err(TssError::Config(format!(
                "transport sends as [{}] but the local member is [{}]",
                transport.local_member(),
                group.member_id()
            )));
        }

        let subscription = transport.subscribe(group.group_id())?;
        let (messages_tx, messages_rx) = async_channel::unbounded();
        let (signals_tx, signals_rx) = async_channel::bounded(SIGNAL_QUEUE_CAPACITY);
        let announce = Envelope::Announce(AnnounceMessage {
            sender_id: group.member_id().clone(),
        })
        .encode()?;

        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher {
            group: group.clone(),
            transport: transport.clone(),
            messages: messages_tx,
            signals: signals_tx,
            announce,
            delivered: HashSet::new(),
        };
        let handle = tokio::spawn(dispatcher.run(subscription, shutdown.clone()));

        debug!(
            "Bridge connected for member {} in group {}",
            group.member_id(),
            group.group_id()
        );

        Ok(Self {
            group,
            transport,
            messages: messages_rx,
            signals: signals_rx,
            shutdown,
            dispatcher: Some(handle),
        })
    }

    pub fn group(&self) -> &GroupInfo {
        &self.group
    }

    /// Send a protocol payload produced by the local party.
    ///
    /// Transport failures are returned as-is and not retried.
    pub async fn send(&self, payload: Vec<u8>, target: Target) -> TssResult<()> {
        if let Target::Member(recipient) = &target {
            if !self.group.is_member(recipient) || recipient == self.group.member_id() {
                return Err(TssError::UnexpectedMessage(format!(
                    "recipient [{}] is not a peer in group [{}]",
                    recipient,
                    self.group.group_id()
                )));
            }
        }

        let is_broadcast = target == Target::Broadcast;
        let bytes = Envelope::Protocol(ProtocolMessage {
            sender_id: self.group.member_id().clone(),
            payload,
            is_broadcast,
        })
        .encode()?;
        let len = bytes.len();

        match &target {
            Target::Broadcast => {
                self.transport
                    .broadcast(self.group.group_id(), bytes)
                    .await?
            }
            Target::Member(recipient) => {
                self.transport
                    .send_to(self.group.group_id(), recipient, bytes)
                    .await?
            }
        }

        debug!(
            "Sent {} bytes to {:?} in group {}",
            len,
            target,
            self.group.group_id()
        );
        Ok(())
    }

    /// Lazy stream of inbound protocol messages.
    pub fn receive(&self) -> ProtocolMessages {
        self.messages.clone()
    }

    pub(crate) fn signals(&self) -> &async_channel::Receiver<PeerSignal> {
        &self.signals
    }

    pub(crate) async fn broadcast_join(&self) -> TssResult<()> {
        let bytes = Envelope::Join(JoinMessage {
            sender_id: self.group.member_id().clone(),
        })
        .encode()?;
        self.transport
            .broadcast(self.group.group_id(), bytes)
            .await?;
        Ok(())
    }

    /// Stop dispatching and release the transport route.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.await;
        }
        debug!(
            "Bridge closed for member {} in group {}",
            self.group.member_id(),
            self.group.group_id()
        );
    }
}

impl Drop for NetworkBridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Dispatcher {
    group: Arc<GroupInfo>,
    transport: Arc<dyn Transport>,
    messages: async_channel::Sender<ProtocolMessage>,
    signals: async_channel::Sender<PeerSignal>,
    /// Encoded announce reply, sent for every inbound join.
    announce: Vec<u8>,
    delivered: HashSet<(MemberId, [u8; 32])>,
}

impl Dispatcher {
    async fn run(mut self, subscription: Subscription, shutdown: CancellationToken) {
        loop {
            let inbound = tokio::select! {
                _ = shutdown.cancelled() => break,
                inbound = subscription.recv() => match inbound {
                    Some(inbound) => inbound,
                    None => break,
                },
            };

            let sender = inbound.sender.clone();
            if let Err(err) = self.dispatch(inbound).await {
                warn!(
                    "Discarding message from {} in group {}: {}",
                    sender,
                    self.group.group_id(),
                    err
                );
                LogEvent::new(EventType::MessageDropped)
                    .with_correlation_id(self.group.group_id())
                    .with_member(self.group.member_id().to_string())
                    .with_context("sender", sender.to_string())
                    .with_error(err.to_string())
                    .emit();
            }
        }

        self.messages.close();
        self.signals.close();
        // `subscription` drops here, releasing the route.
    }

    async fn dispatch(&mut self, inbound: InboundEnvelope) -> TssResult<()> {
        if inbound.group_id != self.group.group_id() {
            return Err(TssError::UnexpectedMessage(format!(
                "envelope addressed to group [{}]",
                inbound.group_id
            )));
        }
        if !self.group.is_member(&inbound.sender) {
            return Err(TssError::UnexpectedMessage(format!(
                "sender [{}] is not a group member",
                inbound.sender
            )));
        }
        if inbound.sender == *self.group.member_id() {
            return Err(TssError::UnexpectedMessage(
                "envelope from the local member".into(),
            ));
        }

        let envelope = Envelope::decode(&inbound.bytes)?;
        if *envelope.sender_id() != inbound.sender {
            return Err(TssError::UnexpectedMessage(format!(
                "envelope claims sender [{}] but came from [{}]",
                envelope.sender_id(),
                inbound.sender
            )));
        }

        match envelope {
            Envelope::Protocol(message) => {
                let fingerprint = fingerprint(&message);
                if !self
                    .delivered
                    .insert((message.sender_id.clone(), fingerprint))
                {
                    return Err(TssError::UnexpectedMessage(
                        "duplicate protocol message".into(),
                    ));
                }
                debug!(
                    "Received {} byte protocol message from {}",
                    message.payload.len(),
                    message.sender_id
                );
                // Fails only once the bridge is gone.
                let _ = self.messages.send(message).await;
            }
            Envelope::Join(join) => {
                self.signal(PeerSignal::Join(join.sender_id));
                if let Err(err) = self
                    .transport
                    .broadcast(self.group.group_id(), self.announce.clone())
                    .await
                {
                    warn!(
                        "Failed to announce in group {}: {}",
                        self.group.group_id(),
                        err
                    );
                }
            }
            Envelope::Announce(announce) => {
                self.signal(PeerSignal::Announce(announce.sender_id));
            }
        }
        Ok(())
    }

    fn signal(&self, signal: PeerSignal) {
        if self.signals.try_send(signal).is_err() {
            debug!("Signal queue full, dropping signal");
        }
    }
}

fn fingerprint(message: &ProtocolMessage) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([message.is_broadcast as u8]);
    hasher.update(&message.payload);
    hasher.finalize().into()
}
