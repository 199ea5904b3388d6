//! Messages exchanged between members during an execution.
//!
//! Three kinds of envelope share the transport: round messages of the
//! cryptographic protocol, join signals and announce replies. Each kind is
//! identified on the wire by its [`NetMessage::TYPE`] tag.

use crate::error::TssResult;
use crate::group::MemberId;

/// A message kind that can travel over the transport.
pub trait NetMessage: Sized {
    /// Type tag identifying the message kind on the wire.
    const TYPE: &'static str;

    fn marshal(&self) -> TssResult<Vec<u8>>;

    fn unmarshal(bytes: &[u8]) -> TssResult<Self>;
}

/// One round message of the cryptographic protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub sender_id: MemberId,
    /// Opaque bytes produced by the party.
    pub payload: Vec<u8>,
    pub is_broadcast: bool,
}

/// "I am ready for this execution."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMessage {
    pub sender_id: MemberId,
}

/// Reply to a [`JoinMessage`], telling late joiners the sender is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub sender_id: MemberId,
}

/// Any message that can arrive for an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Protocol(ProtocolMessage),
    Join(JoinMessage),
    Announce(AnnounceMessage),
}

impl Envelope {
    /// Sender claimed inside the envelope.
    pub fn sender_id(&self) -> &MemberId {
        match self {
            Self::Protocol(message) => &message.sender_id,
            Self::Join(message) => &message.sender_id,
            Self::Announce(message) => &message.sender_id,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Protocol(_) => ProtocolMessage::TYPE,
            Self::Join(_) => JoinMessage::TYPE,
            Self::Announce(_) => AnnounceMessage::TYPE,
        }
    }
}

impl From<ProtocolMessage> for Envelope {
    fn from(message: ProtocolMessage) -> Self {
        Self::Protocol(message)
    }
}

impl From<JoinMessage> for Envelope {
    fn from(message: JoinMessage) -> Self {
        Self::Join(message)
    }
}

impl From<AnnounceMessage> for Envelope {
    fn from(message: AnnounceMessage) -> Self {
        Self::Announce(message)
    }
}
