//! Join barrier run before the first protocol round.
//!
//! Every member broadcasts a join and waits until it has heard a join or an
//! announce from each other member. Peers answer every join with an
//! announce, and a waiting member re-broadcasts its join periodically, so
//! members that subscribe late still converge.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info};

use crate::bridge::NetworkBridge;
use crate::deadline::ExecutionDeadline;
use crate::error::{TssError, TssResult};
use crate::group::MemberId;
use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinState {
    Idle,
    Announcing,
    Waiting { seen: BTreeSet<MemberId> },
    Ready,
    TimedOut,
}

pub struct JoinProtocol<'a> {
    bridge: &'a NetworkBridge,
    retransmit_interval: Duration,
    state: JoinState,
}

impl<'a> JoinProtocol<'a> {
    pub fn new(bridge: &'a NetworkBridge, retransmit_interval: Duration) -> Self {
        Self {
            bridge,
            retransmit_interval,
            state: JoinState::Idle,
        }
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    /// Wait until every other member is present or `deadline` expires.
    pub async fn run(&mut self, deadline: &ExecutionDeadline) -> TssResult<()> {
        let bridge = self.bridge;
        let group = bridge.group();
        let expected: BTreeSet<MemberId> = group.peers().cloned().collect();

        self.state = JoinState::Announcing;
        match deadline.run(bridge.broadcast_join()).await {
            Some(sent) => sent?,
            None => return Err(self.timed_out(&expected, &BTreeSet::new())),
        }

        let mut seen = BTreeSet::new();
        self.state = JoinState::Waiting { seen: seen.clone() };
        debug!(
            "Member {} waiting for {} peers in group {}",
            group.member_id(),
            expected.len(),
            group.group_id()
        );

        let mut retransmit = tokio::time::interval(self.retransmit_interval);
        retransmit.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the join above covers it.
        retransmit.tick().await;

        let signals = bridge.signals();
        while seen != expected {
            tokio::select! {
                biased;
                _ = deadline.token().cancelled() => {
                    return Err(self.timed_out(&expected, &seen));
                }
                signal = signals.recv() => {
                    let signal = signal.map_err(|_| TssError::Transport(TransportError::ChannelClosed))?;
                    let sender = signal.sender().clone();
                    if expected.contains(&sender) && seen.insert(sender.clone()) {
                        debug!("Member {} saw {:?}", group.member_id(), signal);
                        self.state = JoinState::Waiting { seen: seen.clone() };
                    }
                }
                _ = retransmit.tick() => {
                    match deadline.run(bridge.broadcast_join()).await {
                        Some(sent) => sent?,
                        None => return Err(self.timed_out(&expected, &seen)),
                    }
                }
            }
        }

        self.state = JoinState::Ready;
        info!(
            "Member {} joined group {} with all {} peers",
            group.member_id(),
            group.group_id(),
            expected.len()
        );
        Ok(())
    }

    fn timed_out(&mut self, expected: &BTreeSet<MemberId>, seen: &BTreeSet<MemberId>) -> TssError {
        self.state = JoinState::TimedOut;
        TssError::JoinTimeout {
            missing: expected.difference(seen).cloned().collect(),
        }
    }
}
