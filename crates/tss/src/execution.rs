//! Lifecycle shared by key generation and signing.
//!
//! Initialize the party, bind a bridge, pass the join barrier and drive the
//! rounds, all under one deadline that starts before initialization. The bridge is closed on every exit path.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{EventType, LogEvent};
use tracing::{error, info};

use crate::bridge::NetworkBridge;
use crate::deadline::ExecutionDeadline;
use crate::error::{TssError, TssResult};
use crate::group::GroupInfo;
use crate::join::JoinProtocol;
use crate::party::{Party, PartyError};
use crate::runner::{drive, DriveError};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionKind {
    KeyGeneration,
    Signing,
}

impl ExecutionKind {
    fn timeout_error(self, timeout: Duration) -> TssError {
        match self {
            Self::KeyGeneration => TssError::KeyGenerationTimeout(timeout),
            Self::Signing => TssError::SigningTimeout(timeout),
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyGeneration => write!(f, "keygen"),
            Self::Signing => write!(f, "signing"),
        }
    }
}

pub(crate) struct ExecutionSettings {
    pub kind: ExecutionKind,
    pub timeout: Duration,
    pub join_retransmit_interval: Duration,
}

pub(crate) async fn execute<P, F>(
    settings: ExecutionSettings,
    group: Arc<GroupInfo>,
    transport: Arc<dyn Transport>,
    initialize: F,
) -> TssResult<P::Output>
where
    P: Party,
    F: FnOnce(&GroupInfo) -> Result<P, PartyError>,
{
    let started = Instant::now();
    let event = |event_type| {
        LogEvent::new(event_type)
            .with_correlation_id(group.group_id())
            .with_member(group.member_id().to_string())
            .with_protocol(settings.kind.to_string())
    };

    event(EventType::ExecutionStarted)
        .with_context("members", group.group_size().to_string())
        .with_context("threshold", group.dishonest_threshold().to_string())
        .emit();

    let deadline = ExecutionDeadline::start(settings.timeout);
    let party = initialize(&group).map_err(|err| match err {
        PartyError::Failure(source) => TssError::ProtocolFailure { source },
        other => TssError::protocol_failure(other),
    })?;
    // Initialization runs inline, so the timer task may not have fired yet.
    if tokio::time::Instant::now() >= deadline.expires_at() {
        let err = settings.kind.timeout_error(settings.timeout);
        event(EventType::ExecutionTimeout)
            .with_duration(started.elapsed())
            .with_error(err.to_string())
            .emit();
        return Err(err);
    }

    let bridge = NetworkBridge::connect(group.clone(), transport)?;
    let result = run(&settings, party, &bridge, &deadline).await;
    bridge.close().await;

    match &result {
        Ok(_) => {
            info!(
                "{} completed for member {} in group {} after {:?}",
                settings.kind,
                group.member_id(),
                group.group_id(),
                started.elapsed()
            );
            event(EventType::ExecutionCompleted)
                .with_duration(started.elapsed())
                .emit();
        }
        Err(err) => {
            error!(
                "{} failed for member {} in group {}: {}",
                settings.kind,
                group.member_id(),
                group.group_id(),
                err
            );
            let event_type = if err.is_timeout() {
                EventType::ExecutionTimeout
            } else {
                EventType::ExecutionFailed
            };
            event(event_type)
                .with_duration(started.elapsed())
                .with_error(err.to_string())
                .emit();
        }
    }
    result
}

async fn run<P: Party>(
    settings: &ExecutionSettings,
    party: P,
    bridge: &NetworkBridge,
    deadline: &ExecutionDeadline,
) -> TssResult<P::Output> {
    let group = bridge.group();

    let mut join = JoinProtocol::new(bridge, settings.join_retransmit_interval);
    if let Err(err) = join.run(deadline).await {
        if let TssError::JoinTimeout { missing } = &err {
            LogEvent::new(EventType::JoinTimeout)
                .with_correlation_id(group.group_id())
                .with_member(group.member_id().to_string())
                .with_protocol(settings.kind.to_string())
                .with_context("missing", missing.len().to_string())
                .emit();
        }
        return Err(err);
    }
    LogEvent::new(EventType::JoinCompleted)
        .with_correlation_id(group.group_id())
        .with_member(group.member_id().to_string())
        .with_protocol(settings.kind.to_string())
        .emit();

    info!(
        "Starting {} rounds for member {} in group {}",
        settings.kind,
        group.member_id(),
        group.group_id()
    );
    drive(party, bridge, deadline).await.map_err(|err| match err {
        DriveError::Expired => settings.kind.timeout_error(settings.timeout),
        DriveError::Protocol(source) => TssError::ProtocolFailure { source },
        DriveError::Network(err) => err,
    })
}
