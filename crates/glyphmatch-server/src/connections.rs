//! Connection handles and room broadcast groups.
//!
//! A connection is an outbound channel feeding its socket's writer task,
//! plus back-references to the groups it joined so close-time cleanup can
//! sweep them. A group is a named multicast set of connections, created
//! lazily on first join and deleted when its last member leaves; both
//! transitions run through a fairness queue keyed by the group id so
//! concurrent first-joiners cannot create two groups for one room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::fair_queue::FairQueue;

/// Per-connection sender for outbound text frames. Bounded so one slow
/// browser cannot grow server memory; overflow drops the frame for that
/// connection only.
pub type OutboundSender = mpsc::Sender<String>;

struct ConnectionEntry {
    sender: OutboundSender,
    groups: Vec<String>,
}

/// Live duplex connections keyed by their opaque identity.
pub struct ConnectionRegistry {
    inner: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, connection_id: Uuid, sender: OutboundSender) {
        self.inner.write().unwrap().insert(
            connection_id,
            ConnectionEntry {
                sender,
                groups: Vec::new(),
            },
        );
    }

    /// Drop a connection, returning the groups it was in. The first close
    /// signal wins; repeats get `None`, which makes disconnect cleanup
    /// naturally idempotent.
    pub fn remove(&self, connection_id: Uuid) -> Option<Vec<String>> {
        self.inner
            .write()
            .unwrap()
            .remove(&connection_id)
            .map(|entry| entry.groups)
    }

    pub fn sender(&self, connection_id: Uuid) -> Option<OutboundSender> {
        self.inner
            .read()
            .unwrap()
            .get(&connection_id)
            .map(|entry| entry.sender.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    fn track_group(&self, connection_id: Uuid, group_id: &str) {
        if let Some(entry) = self.inner.write().unwrap().get_mut(&connection_id)
            && !entry.groups.iter().any(|g| g == group_id)
        {
            entry.groups.push(group_id.to_string());
        }
    }

    fn untrack_group(&self, connection_id: Uuid, group_id: &str) {
        if let Some(entry) = self.inner.write().unwrap().get_mut(&connection_id) {
            entry.groups.retain(|g| g != group_id);
        }
    }

    /// Send one frame to one connection, best effort.
    pub fn send_to(&self, connection_id: Uuid, frame: String) {
        if let Some(sender) = self.sender(connection_id)
            && let Err(e) = sender.try_send(frame)
        {
            tracing::debug!(%connection_id, error = %e, "Dropping frame for slow connection");
        }
    }
}

/// One room's audience: the connections that receive its signals.
pub struct BroadcastGroup {
    id: String,
    members: Mutex<HashMap<Uuid, OutboundSender>>,
}

impl BroadcastGroup {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            members: Mutex::new(HashMap::new()),
        }
    }

    fn add(&self, connection_id: Uuid, sender: OutboundSender) {
        self.members.lock().unwrap().insert(connection_id, sender);
    }

    /// Remove a member; returns whether the group still has any.
    fn remove(&self, connection_id: Uuid) -> bool {
        let mut members = self.members.lock().unwrap();
        members.remove(&connection_id);
        !members.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.members.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    /// Fan a frame out to every member. Slow members miss the frame; they
    /// never block the rest of the group.
    pub fn broadcast(&self, frame: &str) {
        let members = self.members.lock().unwrap();
        for (connection_id, sender) in members.iter() {
            if let Err(e) = sender.try_send(frame.to_string()) {
                tracing::debug!(
                    %connection_id,
                    group = %self.id,
                    error = %e,
                    "Skipping broadcast to slow connection"
                );
            }
        }
    }
}

/// Named broadcast groups, one per room.
pub struct GroupRegistry {
    /// Serializes lazy creation and empty-group deletion per group id.
    group_queue: FairQueue,
    groups: RwLock<HashMap<String, Arc<BroadcastGroup>>>,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            group_queue: FairQueue::new(),
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().unwrap().is_empty()
    }

    /// Get or lazily create the group. Creation is double-checked after the
    /// caller's queue turn, so two racing first-joiners converge on one
    /// group.
    pub async fn group(&self, group_id: &str) -> Arc<BroadcastGroup> {
        if let Some(group) = self.groups.read().unwrap().get(group_id) {
            return Arc::clone(group);
        }
        self.group_queue
            .run(group_id, || {
                if let Some(group) = self.groups.read().unwrap().get(group_id) {
                    return Arc::clone(group);
                }
                let group = Arc::new(BroadcastGroup::new(group_id));
                self.groups
                    .write()
                    .unwrap()
                    .insert(group_id.to_string(), Arc::clone(&group));
                group
            })
            .await
    }

    /// Put a connection into a group, tracking the membership on the
    /// connection for close-time cleanup.
    pub async fn add_to_group(
        &self,
        connections: &ConnectionRegistry,
        connection_id: Uuid,
        group_id: &str,
    ) {
        let Some(sender) = connections.sender(connection_id) else {
            return;
        };
        self.group(group_id).await.add(connection_id, sender);
        connections.track_group(connection_id, group_id);
    }

    /// Take a connection out of a group, deleting the group if that
    /// emptied it.
    pub async fn remove_from_group(
        &self,
        connections: &ConnectionRegistry,
        connection_id: Uuid,
        group_id: &str,
    ) {
        connections.untrack_group(connection_id, group_id);
        let existing = self.groups.read().unwrap().get(group_id).cloned();
        if let Some(group) = existing
            && !group.remove(connection_id)
        {
            self.drop_if_empty(group_id).await;
        }
    }

    /// Remove a closed connection from every group it had joined.
    pub async fn sweep_connection(&self, connection_id: Uuid, group_ids: Vec<String>) {
        for group_id in group_ids {
            let existing = self.groups.read().unwrap().get(&group_id).cloned();
            if let Some(group) = existing
                && !group.remove(connection_id)
            {
                self.drop_if_empty(&group_id).await;
            }
        }
    }

    /// Fan a frame out to an existing group. A missing group means an empty
    /// audience, not an error.
    pub fn broadcast(&self, group_id: &str, frame: &str) {
        if let Some(group) = self.groups.read().unwrap().get(group_id) {
            group.broadcast(frame);
        }
    }

    /// Deletion is re-checked under the queue turn: a joiner may have
    /// repopulated the group since it looked empty.
    async fn drop_if_empty(&self, group_id: &str) {
        self.group_queue
            .run(group_id, || {
                let mut groups = self.groups.write().unwrap();
                if groups.get(group_id).is_some_and(|g| g.is_empty()) {
                    groups.remove(group_id);
                }
            })
            .await;
    }
}
