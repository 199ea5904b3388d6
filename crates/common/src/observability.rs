//! Observability primitives for threshold executions.
//!
//! Key generation and signing runs report their lifecycle through
//! [`LogEvent`]s: a structured record serialized to JSON and emitted through
//! `tracing`, so log aggregation can filter on `event_type` and correlate on
//! the execution (group) id.
//!
//! ## Usage
//!
//! ```ignore
//! use common::observability::{EventType, LogEvent};
//!
//! LogEvent::new(EventType::ExecutionStarted)
//!     .with_correlation_id("wallet-7/signing/ab12")
//!     .with_member("0a0b")
//!     .with_protocol("signing")
//!     .emit();
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Standardized event types for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Execution lifecycle
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionTimeout,

    // Join barrier
    JoinCompleted,
    JoinTimeout,

    // Traffic
    MessageDropped,

    // Key material
    PreParamsMissing,
}

impl EventType {
    /// Whether the event describes a failure and should be logged at warn level.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ExecutionFailed
                | Self::ExecutionTimeout
                | Self::JoinTimeout
                | Self::MessageDropped
                | Self::PreParamsMissing
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionCompleted => "execution_completed",
            Self::ExecutionFailed => "execution_failed",
            Self::ExecutionTimeout => "execution_timeout",
            Self::JoinCompleted => "join_completed",
            Self::JoinTimeout => "join_timeout",
            Self::MessageDropped => "message_dropped",
            Self::PreParamsMissing => "pre_params_missing",
        };
        write!(f, "{}", s)
    }
}

/// A structured log event with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Event type for filtering.
    pub event_type: EventType,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Correlation ID, the execution's group id.
    pub correlation_id: Option<String>,
    /// Hex encoded id of the member that generated this event.
    pub member_id: Option<String>,
    /// Protocol name (keygen, signing).
    pub protocol: Option<String>,
    /// Duration in milliseconds if applicable.
    pub duration_ms: Option<u64>,
    /// Additional context as key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
    /// Error message if this is an error event.
    pub error: Option<String>,
}

impl LogEvent {
    /// Create a new log event stamped with the current time.
    pub fn new(event_type: EventType) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            event_type,
            timestamp_ms,
            correlation_id: None,
            member_id: None,
            protocol: None,
            duration_ms: None,
            context: HashMap::new(),
            error: None,
        }
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Set the reporting member.
    pub fn with_member(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self
    }

    /// Set protocol name.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    /// Add context key-value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Set error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Emit this event using tracing.
    pub fn emit(&self) {
        let json = serde_json::to_string(&self).unwrap_or_default();

        if self.event_type.is_failure() {
            tracing::warn!(event = %json, "observability_event");
        } else {
            tracing::info!(event = %json, "observability_event");
        }
    }
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, falling back to
/// `default_directive` when the variable is unset or unparsable.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
