//! In-process transport.
//!
//! [`InMemoryNetwork`] owns the routing table shared by every
//! [`InMemoryTransport`] created from it. Routes are keyed by
//! `(group_id, member)`: a route is inserted when a member subscribes for a
//! group and removed when that subscription is dropped, so concurrent
//! executions of one member never see each other's traffic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::group::MemberId;
use crate::transport::{InboundEnvelope, Subscription, Transport, TransportError};

type RouteKey = (String, MemberId);

#[derive(Default)]
struct NetworkState {
    routes: RwLock<HashMap<RouteKey, async_channel::Sender<InboundEnvelope>>>,
    offline: RwLock<HashSet<MemberId>>,
    sent: AtomicU64,
}

impl NetworkState {
    fn routes(&self) -> RwLockReadGuard<'_, HashMap<RouteKey, async_channel::Sender<InboundEnvelope>>> {
        self.routes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn routes_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<RouteKey, async_channel::Sender<InboundEnvelope>>> {
        self.routes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_offline(&self, member: &MemberId) -> bool {
        self.offline
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(member)
    }
}

/// A network of in-process members.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    state: Arc<NetworkState>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport sending as `member`.
    pub fn transport(&self, member: MemberId) -> Arc<InMemoryTransport> {
        Arc::new(InMemoryTransport {
            state: self.state.clone(),
            member,
        })
    }

    /// Take `member` off the network: its sends fail and nothing reaches it.
    pub fn set_offline(&self, member: &MemberId, offline: bool) {
        let mut set = self
            .state
            .offline
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if offline {
            set.insert(member.clone());
        } else {
            set.remove(member);
        }
    }

    /// Number of live `(group_id, member)` routes.
    pub fn route_count(&self) -> usize {
        self.state.routes().len()
    }

    /// Whether `member` currently has a route for `group_id`.
    pub fn has_route(&self, group_id: &str, member: &MemberId) -> bool {
        self.state
            .routes()
            .contains_key(&(group_id.to_string(), member.clone()))
    }

    /// Number of envelopes accepted for sending since the network was created.
    pub fn sent_count(&self) -> u64 {
        self.state.sent.load(Ordering::Relaxed)
    }
}

/// One member's view of an [`InMemoryNetwork`].
pub struct InMemoryTransport {
    state: Arc<NetworkState>,
    member: MemberId,
}

impl InMemoryTransport {
    fn check_online(&self) -> Result<(), TransportError> {
        if self.state.is_offline(&self.member) {
            return Err(TransportError::NotConnected {
                member: self.member.clone(),
            });
        }
        Ok(())
    }

    fn deliver(&self, route: &RouteKey, tx: &async_channel::Sender<InboundEnvelope>, bytes: Vec<u8>) {
        if self.state.is_offline(&route.1) {
            debug!("Dropping envelope for offline member {}", route.1);
            return;
        }
        let envelope = InboundEnvelope {
            group_id: route.0.clone(),
            sender: self.member.clone(),
            bytes,
        };
        if tx.try_send(envelope).is_err() {
            debug!("Route {}/{} closed, dropping envelope", route.0, route.1);
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn local_member(&self) -> &MemberId {
        &self.member
    }

    async fn broadcast(&self, group_id: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.check_online()?;
        self.state.sent.fetch_add(1, Ordering::Relaxed);

        let routes = self.state.routes();
        for (route, tx) in routes.iter() {
            if route.0 == group_id && route.1 != self.member {
                self.deliver(route, tx, bytes.clone());
            }
        }
        Ok(())
    }

    async fn send_to(
        &self,
        group_id: &str,
        recipient: &MemberId,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.check_online()?;
        self.state.sent.fetch_add(1, Ordering::Relaxed);

        let route = (group_id.to_string(), recipient.clone());
        match self.state.routes().get(&route) {
            Some(tx) => self.deliver(&route, tx, bytes),
            None => debug!(
                "No route for {} in group {}, dropping envelope",
                recipient, group_id
            ),
        }
        Ok(())
    }

    fn subscribe(&self, group_id: &str) -> Result<Subscription, TransportError> {
        let route = (group_id.to_string(), self.member.clone());
        let (tx, rx) = async_channel::unbounded();

        {
            let mut routes = self.state.routes_mut();
            if routes.contains_key(&route) {
                return Err(TransportError::AlreadySubscribed {
                    group_id: route.0,
                    member: route.1,
                });
            }
            routes.insert(route.clone(), tx);
        }
        debug!("Registered route {}/{}", route.0, route.1);

        let state = self.state.clone();
        Ok(Subscription::new(rx, move || {
            state.routes_mut().remove(&route);
            debug!("Released route {}/{}", route.0, route.1);
        }))
    }
}
