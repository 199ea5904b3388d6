//! Transport abstraction for execution traffic.
//!
//! The orchestration layer never talks to peers directly. It hands encoded
//! envelopes to a [`Transport`] and consumes a [`Subscription`] of inbound
//! envelopes tagged with their originating group and sender.
//!
//! ```text
//! KeyGenerator / Signer
//!     ↓
//! NetworkBridge (screening, routing)
//!     ↓
//! Transport trait (abstract)
//!     ├─ InMemoryTransport (in-process, see `memory`)
//!     └─ broadcast channel / P2P implementations (external)
//! ```

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::group::MemberId;

/// Errors that can occur during transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Failed to hand an envelope to the network.
    #[error("failed to send message to {recipient}: {reason}")]
    SendFailed { recipient: String, reason: String },

    /// The local member is not connected.
    #[error("member {member} is not connected")]
    NotConnected { member: MemberId },

    /// A route for this group and member already exists.
    #[error("member {member} is already subscribed to group {group_id}")]
    AlreadySubscribed { group_id: String, member: MemberId },

    /// Internal channel closed unexpectedly.
    #[error("internal channel closed")]
    ChannelClosed,
}

/// An envelope received from the network.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    /// Group (execution) the envelope was published to.
    pub group_id: String,
    /// Member that published it, as authenticated by the transport.
    pub sender: MemberId,
    pub bytes: Vec<u8>,
}

/// Point-to-point and group messaging for a single local member.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The member this transport sends as.
    fn local_member(&self) -> &MemberId;

    /// Deliver to every other subscriber of `group_id`.
    async fn broadcast(&self, group_id: &str, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Deliver to one member of `group_id`.
    async fn send_to(
        &self,
        group_id: &str,
        recipient: &MemberId,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Start receiving envelopes published to `group_id`.
    fn subscribe(&self, group_id: &str) -> Result<Subscription, TransportError>;
}

type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// Stream of inbound envelopes for one `(group_id, member)` route.
///
/// Dropping the subscription releases the route.
pub struct Subscription {
    receiver: async_channel::Receiver<InboundEnvelope>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new(
        receiver: async_channel::Receiver<InboundEnvelope>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Next envelope, or `None` once the route is closed.
    pub async fn recv(&self) -> Option<InboundEnvelope> {
        self.receiver.recv().await.ok()
    }

    /// Envelopes received but not yet consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
