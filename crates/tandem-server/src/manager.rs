//! Room lifecycle: creation, lookup, and garbage collection.
//!
//! The manager owns the id → handle map and nothing else; live room state
//! belongs to the room tasks. Teardown is cooperative: a room that reports
//! empty gets a grace period, then a `ReapIfEmpty` probe through its own
//! queue, so a join landing during the grace window wins cleanly.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use tandem_types::{RoomId, ServerMessage, Session, SyncError};

use crate::config::{JoinPolicy, ServerConfig};
use crate::room::{Room, RoomCommand, RoomHandle};
use crate::upstream::{AssistGateway, ExecutionBackend};

/// Room lifecycle events, for observers (tests, admin tooling).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomLifecycle {
    Created { room: RoomId },
    Destroyed { room: RoomId },
}

pub struct RoomManager {
    rooms: DashMap<RoomId, RoomHandle>,
    events: broadcast::Sender<RoomLifecycle>,
    config: ServerConfig,
    executor: Arc<dyn ExecutionBackend>,
    assist: Arc<dyn AssistGateway>,
}

impl RoomManager {
    pub fn new(
        config: ServerConfig,
        executor: Arc<dyn ExecutionBackend>,
        assist: Arc<dyn AssistGateway>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            rooms: DashMap::new(),
            events,
            config,
            executor,
            assist,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> Arc<dyn ExecutionBackend> {
        self.executor.clone()
    }

    pub(crate) fn assist(&self) -> Arc<dyn AssistGateway> {
        self.assist.clone()
    }

    /// Subscribe to created/destroyed events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomLifecycle> {
        self.events.subscribe()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get(&self, id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(id).map(|entry| entry.clone())
    }

    /// Create a room under a fresh random id.
    pub fn create_room(self: &Arc<Self>) -> RoomHandle {
        let id = RoomId::generate();
        info!(room = %id, "room created");
        self.spawn_room(id)
    }

    /// Look a room up, creating it when the join policy allows.
    pub fn get_or_create(self: &Arc<Self>, id: &RoomId) -> Result<RoomHandle, SyncError> {
        if let Some(handle) = self.get(id) {
            return Ok(handle);
        }
        match self.config.join_policy {
            JoinPolicy::AutoCreate => {
                info!(room = %id, "room auto-created on join");
                Ok(self.spawn_room(id.clone()))
            }
            JoinPolicy::RequireExisting => Err(SyncError::UnknownRoom(id.clone())),
        }
    }

    /// Join a session into a room, retrying once if the handle turns out to
    /// belong to a room that reaped itself between lookup and join.
    pub async fn join(
        self: &Arc<Self>,
        id: &RoomId,
        display_name: &str,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(RoomHandle, Session), SyncError> {
        for _ in 0..2 {
            let handle = self.get_or_create(id)?;
            match handle.join(display_name.to_string(), outbound.clone()).await {
                Some(session) => return Ok((handle, session)),
                None => {
                    debug!(room = %id, "join hit a closed room, retrying");
                    self.rooms.remove_if(id, |_, existing| existing.same_channel(&handle));
                }
            }
        }
        Err(SyncError::UnknownRoom(id.clone()))
    }

    fn spawn_room(self: &Arc<Self>, id: RoomId) -> RoomHandle {
        // Entry API so two concurrent joins to the same new id share one
        // room; only the call that actually inserted announces it.
        let mut inserted = false;
        let handle = self
            .rooms
            .entry(id.clone())
            .or_insert_with(|| {
                inserted = true;
                Room::spawn(id.clone(), self.clone())
            })
            .clone();
        if inserted {
            let _ = self.events.send(RoomLifecycle::Created { room: id });
        }
        handle
    }

    /// Start the grace timer for a room that just reported empty.
    pub(crate) fn schedule_reap(self: &Arc<Self>, room: RoomId, epoch: u64) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(manager.config.room_grace).await;
            manager.reap_if_empty(&room, epoch).await;
        });
    }

    async fn reap_if_empty(&self, room: &RoomId, epoch: u64) {
        let Some(handle) = self.get(room) else {
            return;
        };
        let (reply, rx) = oneshot::channel();
        if !handle.send(RoomCommand::ReapIfEmpty { epoch, reply }) {
            // Queue already closed; just drop the stale map entry.
            self.rooms.remove_if(room, |_, existing| existing.same_channel(&handle));
            return;
        }
        if rx.await.unwrap_or(false) {
            self.rooms.remove(room);
            info!(room = %room, "room destroyed");
            let _ = self.events.send(RoomLifecycle::Destroyed { room: room.clone() });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
