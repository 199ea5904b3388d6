//! Capability contract of the cryptographic computation.
//!
//! The round logic of threshold ECDSA lives outside this crate. The
//! orchestrators drive any implementation of [`Party`]: start it, feed it
//! inbound round messages, forward what it wants sent, and collect its
//! result once complete. A party never touches the network itself.

use thiserror::Error;

use crate::bridge::Target;
use crate::error::BoxError;
use crate::group::{GroupInfo, MemberId};
use crate::key::{LocalPreParams, Signature, ThresholdKey, ThresholdSigner, DIGEST_LENGTH};
use crate::message::ProtocolMessage;

/// Errors reported by a party.
#[derive(Debug, Error)]
pub enum PartyError {
    /// The message was rejected and dropped; the computation continues.
    #[error("unexpected message from {sender}: {reason}")]
    UnexpectedMessage { sender: MemberId, reason: String },

    /// The computation cannot complete.
    #[error(transparent)]
    Failure(BoxError),
}

impl PartyError {
    pub fn failure(cause: impl Into<BoxError>) -> Self {
        Self::Failure(cause.into())
    }

    pub fn unexpected(sender: &MemberId, reason: impl Into<String>) -> Self {
        Self::UnexpectedMessage {
            sender: sender.clone(),
            reason: reason.into(),
        }
    }
}

/// A message the party wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    pub target: Target,
}

impl OutboundMessage {
    pub fn broadcast(payload: Vec<u8>) -> Self {
        Self {
            payload,
            target: Target::Broadcast,
        }
    }

    pub fn to_member(member: MemberId, payload: Vec<u8>) -> Self {
        Self {
            payload,
            target: Target::Member(member),
        }
    }
}

/// One member's share of a multi-round computation.
///
/// Calls are made from a blocking worker thread, so implementations may do
/// expensive work synchronously.
pub trait Party: Send + 'static {
    type Output: Send + 'static;

    /// Begin the first round.
    fn start(&mut self) -> Result<(), PartyError>;

    /// Process one inbound round message.
    fn feed(&mut self, message: ProtocolMessage) -> Result<(), PartyError>;

    /// Take the messages produced since the last call.
    fn drain_outbound(&mut self) -> Vec<OutboundMessage>;

    fn is_complete(&self) -> bool;

    /// Final output, available once [`Party::is_complete`] returns true.
    fn result(&mut self) -> Result<Self::Output, PartyError>;
}

/// Creates key generation parties.
///
/// `initialize` runs on the async executor and its time counts against the
/// execution deadline. It should only set up state; expensive work such as
/// generating missing pre-parameters belongs in [`Party::start`], which runs
/// on the blocking worker.
pub trait KeygenProtocol: Send + Sync {
    type Party: Party<Output = ThresholdKey>;

    fn initialize(
        &self,
        group: &GroupInfo,
        pre_params: Option<LocalPreParams>,
    ) -> Result<Self::Party, PartyError>;
}

/// Creates signing parties.
///
/// As with [`KeygenProtocol`], `initialize` must stay cheap.
///
/// `signing_group` lists the cooperating members; its id is the signing
/// execution id and its member order may differ from the key's group.
pub trait SigningProtocol: Send + Sync {
    type Party: Party<Output = Signature>;

    fn initialize(
        &self,
        signer: &ThresholdSigner,
        signing_group: &GroupInfo,
        digest: &[u8; DIGEST_LENGTH],
    ) -> Result<Self::Party, PartyError>;
}
