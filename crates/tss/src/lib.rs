//! Threshold ECDSA orchestration.
//!
//! This crate coordinates a group of members that jointly generate an ECDSA
//! (secp256k1) key and later sign with it, without any member ever holding
//! the whole private key. The cryptographic rounds are supplied through the
//! [`Party`] capability; this crate handles everything around them:
//!
//! - **Group validation**: [`GroupInfo`] checks size and dishonest threshold.
//! - **Routing**: [`NetworkBridge`] binds one execution to a [`Transport`] and
//!   screens inbound traffic.
//! - **Join barrier**: [`JoinProtocol`] waits for every member before round one.
//! - **Deadlines**: every execution is bounded by an [`ExecutionDeadline`].
//! - **Codec**: deterministic encoding of envelopes and [`ThresholdSigner`]s.
//!
//! ## Usage
//!
//! ```ignore
//! let network = InMemoryNetwork::new();
//! let transport = network.transport(member_id.clone());
//!
//! let group = GroupInfo::new("wallet-7", member_id, members, 1)?;
//! let keygen = KeyGenerator::new(my_keygen_protocol, transport.clone(), TssConfig::default());
//! let signer = keygen.generate(group, Some(pre_params)).await?;
//!
//! let signing = Signer::new(my_signing_protocol, transport, TssConfig::default());
//! let signature = signing.sign(&signer, &digest).await?;
//! ```

pub mod bridge;
pub mod config;
pub mod deadline;
pub mod error;
mod execution;
pub mod group;
pub mod join;
pub mod key;
pub mod keygen;
pub mod marshaling;
pub mod memory;
pub mod message;
pub mod party;
pub mod pre_params;
mod runner;
pub mod signing;
pub mod transport;

pub use bridge::{NetworkBridge, PeerSignal, ProtocolMessages, Target};
pub use config::TssConfig;
pub use deadline::ExecutionDeadline;
pub use error::{BoxError, ErrorCategory, TssError, TssResult};
pub use group::{GroupInfo, MemberId};
pub use join::{JoinProtocol, JoinState};
pub use key::{
    BigNum, CurvePoint, LocalPreParams, LocalSecrets, PaillierPrivateKey, PaillierPublicKey,
    Signature, ThresholdKey, ThresholdSigner, DIGEST_LENGTH,
};
pub use keygen::KeyGenerator;
pub use memory::{InMemoryNetwork, InMemoryTransport};
pub use message::{AnnounceMessage, Envelope, JoinMessage, NetMessage, ProtocolMessage};
pub use party::{KeygenProtocol, OutboundMessage, Party, PartyError, SigningProtocol};
pub use pre_params::generate_pre_params;
pub use signing::{signing_execution_id, Signer};
pub use transport::{InboundEnvelope, Subscription, Transport, TransportError};
