//! Error types for threshold key generation and signing.

use std::time::Duration;

use thiserror::Error;

use crate::group::MemberId;
use crate::party::PartyError;
use crate::transport::TransportError;

/// Boxed cause carried by [`TssError::ProtocolFailure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the orchestration layer.
///
/// Every error is terminal for the execution that raised it; nothing here is
/// retried internally.
#[derive(Debug, Error)]
pub enum TssError {
    /// The group has fewer than two members.
    #[error("group should have at least 2 members but got: [{size}]")]
    InvalidGroupSize { size: usize },

    /// The group is not larger than the dishonest threshold.
    #[error("group size [{group_size}] should be greater than dishonest threshold [{threshold}]")]
    ThresholdTooLarge { group_size: usize, threshold: u32 },

    /// A member id is listed more than once.
    #[error("member [{member}] is listed more than once in the group")]
    DuplicateMember { member: MemberId },

    /// A member id is not part of the group.
    #[error("member [{member}] is not part of the group")]
    MemberNotInGroup { member: MemberId },

    /// Pre-parameters were required by configuration but not supplied.
    #[error("pre-parameters are required but were not provided")]
    MissingPreParams,

    /// The join barrier did not complete before the execution deadline.
    #[error("join timed out waiting for members: {missing:?}")]
    JoinTimeout { missing: Vec<MemberId> },

    /// The transport failed to deliver or subscribe.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An inbound envelope was rejected. Raised while screening traffic and
    /// never stops an execution on its own.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The cryptographic computation failed.
    #[error("protocol failure: {source}")]
    ProtocolFailure {
        #[source]
        source: BoxError,
    },

    /// A signing digest did not have the curve's digest length.
    #[error("digest should be {expected} bytes long but got: [{actual}]")]
    InvalidDigestLength { expected: usize, actual: usize },

    /// Key generation did not finish within its deadline.
    #[error("key generation timed out after {0:?}")]
    KeyGenerationTimeout(Duration),

    /// Signing did not finish within its deadline.
    #[error("signing timed out after {0:?}")]
    SigningTimeout(Duration),

    /// Pre-parameters generation did not finish within its deadline.
    #[error("pre-parameters generation timed out after {0:?}")]
    PreParamsTimeout(Duration),

    /// Encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`TssError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Synchronization,
    Transport,
    Protocol,
    Precondition,
    Timeout,
}

impl TssError {
    pub fn protocol_failure(source: impl Into<BoxError>) -> Self {
        Self::ProtocolFailure {
            source: source.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidGroupSize { .. }
            | Self::ThresholdTooLarge { .. }
            | Self::DuplicateMember { .. }
            | Self::MemberNotInGroup { .. }
            | Self::MissingPreParams
            | Self::Config(_) => ErrorCategory::Configuration,
            Self::JoinTimeout { .. } => ErrorCategory::Synchronization,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::UnexpectedMessage(_) | Self::ProtocolFailure { .. } | Self::Codec(_) => {
                ErrorCategory::Protocol
            }
            Self::InvalidDigestLength { .. } => ErrorCategory::Precondition,
            Self::KeyGenerationTimeout(_)
            | Self::SigningTimeout(_)
            | Self::PreParamsTimeout(_) => ErrorCategory::Timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Timeout | ErrorCategory::Synchronization
        )
    }
}

impl From<PartyError> for TssError {
    fn from(err: PartyError) -> Self {
        match err {
            PartyError::UnexpectedMessage { sender, reason } => {
                Self::UnexpectedMessage(format!("from [{}]: {}", sender, reason))
            }
            PartyError::Failure(source) => Self::ProtocolFailure { source },
        }
    }
}

impl From<bincode::Error> for TssError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type TssResult<T> = Result<T, TssError>;
