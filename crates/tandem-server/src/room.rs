//! The room actor.
//!
//! All mutable room state (document, presence, chat, membership) is owned by
//! one task and mutated only from its command loop. The queue is the
//! serialization point, so no locks and no interleaving inside a command.
//! Everything that needs to touch a room goes through [`RoomCommand`];
//! results come back on session outbound channels (or a oneshot for join).
//!
//! Timers never mutate state directly: typing expiry and empty-room reaping
//! both post commands back into the queue.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use tandem_ot::{Document, Operation, OtError};
use tandem_types::{
    now_millis, EditOp, PresenceDelta, RoomId, SelectionRange, ServerMessage, Session, SessionId,
    SyncError,
};

use crate::chat::ChatLog;
use crate::manager::RoomManager;
use crate::presence::PresenceTracker;
use crate::upstream::{AssistRequest, ExecRequest};

/// Everything a room can be asked to do.
pub enum RoomCommand {
    /// Add a session. The room assigns identity and color and replies with
    /// the birth certificate once the join snapshot is queued.
    Join {
        display_name: String,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<Session>,
    },
    /// Remove a session (explicit leave or disconnect). Idempotent.
    Leave { session: SessionId },
    /// Apply a document edit.
    Edit { session: SessionId, op: EditOp },
    /// Move a cursor / change a selection.
    Cursor {
        session: SessionId,
        position: usize,
        selection: Option<SelectionRange>,
    },
    /// Set or refresh the typing flag.
    Typing { session: SessionId, typing: bool },
    /// A typing expiry timer fired. Ignored unless the epoch still matches.
    TypingExpired { session: SessionId, epoch: u64 },
    /// Post a chat message.
    Chat { session: SessionId, text: String },
    /// Run the current document through the execution backend.
    Execute {
        session: SessionId,
        language: String,
        stdin: String,
    },
    /// Ask the AI gateway about the current document.
    Assist { session: SessionId, instruction: String },
    /// Grace period after the room emptied has elapsed; shut down if it is
    /// still empty and no join bumped the epoch in between.
    ReapIfEmpty {
        epoch: u64,
        reply: oneshot::Sender<bool>,
    },
}

/// Cheap cloneable entry point to a room's queue.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub id: RoomId,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Queue a command. False means the room is gone (reaped).
    pub fn send(&self, cmd: RoomCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }

    /// True if both handles point at the same room task.
    pub(crate) fn same_channel(&self, other: &RoomHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Join this room. `None` means the room shut down before the join was
    /// processed; callers retry through the manager.
    pub async fn join(
        &self,
        display_name: String,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Option<Session> {
        let (reply, rx) = oneshot::channel();
        if !self.send(RoomCommand::Join { display_name, outbound, reply }) {
            return None;
        }
        rx.await.ok()
    }
}

struct Member {
    session: Session,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Task-owned room state. Constructed and spawned by the manager.
pub(crate) struct Room {
    id: RoomId,
    name: String,
    doc: Document,
    presence: PresenceTracker,
    chat: ChatLog,
    members: HashMap<SessionId, Member>,
    join_counter: usize,
    /// Bumped on every join; stale reap timers carry an older value.
    empty_epoch: u64,
    created_at: u64,
    last_activity: u64,
    /// For timer tasks that post back into our own queue.
    tx: mpsc::UnboundedSender<RoomCommand>,
    manager: Arc<RoomManager>,
}

impl Room {
    pub(crate) fn spawn(id: RoomId, manager: Arc<RoomManager>) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = now_millis();
        let room = Room {
            name: id.to_string(),
            id: id.clone(),
            doc: Document::new(),
            presence: PresenceTracker::new(),
            chat: ChatLog::new(),
            members: HashMap::new(),
            join_counter: 0,
            empty_epoch: 0,
            created_at: now,
            last_activity: now,
            tx: tx.clone(),
            manager,
        };
        tokio::spawn(room.run(rx));
        RoomHandle { id, tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        info!(room = %self.id, "room task started");
        // A freshly created room is empty; give it one grace window to
        // receive its first join.
        self.manager.schedule_reap(self.id.clone(), self.empty_epoch);

        while let Some(cmd) = rx.recv().await {
            if self.handle(cmd).is_break() {
                break;
            }
        }
        info!(room = %self.id, "room task stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        self.last_activity = now_millis();
        match cmd {
            RoomCommand::Join { display_name, outbound, reply } => {
                self.handle_join(display_name, outbound, reply);
            }
            RoomCommand::Leave { session } => self.remove_session(session),
            RoomCommand::Edit { session, op } => self.handle_edit(session, op),
            RoomCommand::Cursor { session, position, selection } => {
                self.handle_cursor(session, position, selection);
            }
            RoomCommand::Typing { session, typing } => self.handle_typing(session, typing),
            RoomCommand::TypingExpired { session, epoch } => {
                if self.presence.expire_typing(session, epoch) {
                    debug!(room = %self.id, session = %session, "typing expired");
                    self.broadcast_except(
                        session,
                        ServerMessage::PresenceDelta {
                            delta: PresenceDelta::TypingChanged { session, typing: false },
                        },
                    );
                }
            }
            RoomCommand::Chat { session, text } => self.handle_chat(session, text),
            RoomCommand::Execute { session, language, stdin } => {
                self.handle_execute(session, language, stdin);
            }
            RoomCommand::Assist { session, instruction } => {
                self.handle_assist(session, instruction);
            }
            RoomCommand::ReapIfEmpty { epoch, reply } => {
                let reap = self.members.is_empty() && self.empty_epoch == epoch;
                let _ = reply.send(reap);
                if reap {
                    info!(
                        room = %self.id,
                        lifetime_ms = self.last_activity.saturating_sub(self.created_at),
                        "room empty past grace period, shutting down"
                    );
                    return ControlFlow::Break(());
                }
            }
        }
        ControlFlow::Continue(())
    }

    // ── Membership ──────────────────────────────────────────────────────────

    fn handle_join(
        &mut self,
        display_name: String,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<Session>,
    ) {
        let session = Session::new(self.id.clone(), display_name, self.join_counter);
        self.join_counter += 1;
        self.empty_epoch += 1;

        let entry = self.presence.add(&session);
        info!(
            room = %self.id,
            session = %session.id,
            name = %session.display_name,
            "session joined"
        );

        // Snapshot for the newcomer: room state first, then presence.
        let _ = outbound.send(ServerMessage::Joined {
            room: self.id.clone(),
            room_name: self.name.clone(),
            session: session.id,
            client: session.client,
            color: session.color.clone(),
            document: self.doc.text().to_string(),
            revision: self.doc.revision(),
            chat: self.chat.history().to_vec(),
        });
        let _ = outbound.send(ServerMessage::PresenceSnapshot {
            entries: self.presence.snapshot(),
        });

        // Everyone else just learns about the newcomer.
        self.broadcast_except(
            session.id,
            ServerMessage::PresenceDelta { delta: PresenceDelta::Joined { entry } },
        );

        self.members.insert(session.id, Member { session: session.clone(), outbound });
        let _ = reply.send(session);
    }

    /// Remove a session from presence and membership. Safe to call for
    /// sessions already gone; losers of the disconnect race end up here.
    fn remove_session(&mut self, session: SessionId) {
        if self.members.remove(&session).is_none() {
            return;
        }
        self.presence.remove(session);
        info!(room = %self.id, session = %session, "session left");

        self.broadcast_all(ServerMessage::PresenceDelta {
            delta: PresenceDelta::Left { session },
        });

        if self.members.is_empty() {
            self.manager.schedule_reap(self.id.clone(), self.empty_epoch);
        }
    }

    // ── Document ────────────────────────────────────────────────────────────

    fn handle_edit(&mut self, session: SessionId, edit: EditOp) {
        let Some(member) = self.members.get(&session) else {
            return;
        };
        let client = member.session.client;
        let outbound = member.outbound.clone();

        let op = Operation::from_body(client, edit.base_revision, edit.position, &edit.body);
        match self.doc.apply(op) {
            Ok(committed) => {
                let _ = outbound.send(ServerMessage::Ack { revision: committed.revision });
                self.broadcast_except(
                    session,
                    ServerMessage::OpBroadcast {
                        op: committed.op.to_remote(),
                        revision: committed.revision,
                    },
                );
            }
            Err(OtError::StaleOperation { base, current }) => {
                // A base revision from the future means the client is lying
                // or corrupt. Tell it why, then drop it.
                warn!(
                    room = %self.id,
                    session = %session,
                    base,
                    current,
                    "stale operation, dropping session"
                );
                let err = SyncError::StaleOperation { base, current };
                let _ = outbound.send(ServerMessage::Error {
                    kind: err.kind(),
                    detail: err.to_string(),
                });
                self.remove_session(session);
            }
            Err(err @ OtError::PositionOutOfBounds { .. }) => {
                let err = SyncError::Protocol(err.to_string());
                let _ = outbound.send(ServerMessage::Error {
                    kind: err.kind(),
                    detail: err.to_string(),
                });
            }
        }
    }

    // ── Presence ────────────────────────────────────────────────────────────

    fn handle_cursor(
        &mut self,
        session: SessionId,
        position: usize,
        selection: Option<SelectionRange>,
    ) {
        if self.presence.update_cursor(session, position, selection) {
            self.broadcast_except(
                session,
                ServerMessage::PresenceDelta {
                    delta: PresenceDelta::CursorMoved { session, position, selection },
                },
            );
        }
    }

    fn handle_typing(&mut self, session: SessionId, typing: bool) {
        let Some(update) = self.presence.set_typing(session, typing) else {
            return;
        };
        if update.changed {
            self.broadcast_except(
                session,
                ServerMessage::PresenceDelta {
                    delta: PresenceDelta::TypingChanged { session, typing },
                },
            );
        }
        if let Some(epoch) = update.arm_epoch {
            let tx = self.tx.clone();
            let timeout = self.manager.config().typing_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let _ = tx.send(RoomCommand::TypingExpired { session, epoch });
            });
        }
    }

    // ── Chat ────────────────────────────────────────────────────────────────

    fn handle_chat(&mut self, session: SessionId, text: String) {
        let Some(member) = self.members.get(&session) else {
            return;
        };
        let message = self.chat.post(session, member.session.display_name.clone(), text);
        // Append order is broadcast order, sender included.
        self.broadcast_all(ServerMessage::ChatBroadcast { message });
    }

    // ── Collaborators ───────────────────────────────────────────────────────

    /// Spawned collaborator tasks only write to the requester's outbound
    /// channel. A late response after disconnect just fails the send.
    fn handle_execute(&mut self, session: SessionId, language: String, stdin: String) {
        let Some(member) = self.members.get(&session) else {
            return;
        };
        let outbound = member.outbound.clone();
        let executor = self.manager.executor();
        let deadline = self.manager.config().upstream_timeout;
        let request = ExecRequest {
            language,
            source: self.doc.text().to_string(),
            stdin,
        };

        tokio::spawn(async move {
            let msg = match tokio::time::timeout(deadline, executor.execute(request)).await {
                Ok(Ok(outcome)) => ServerMessage::ExecutionResult {
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                    exit_code: outcome.exit_code,
                },
                Ok(Err(err)) => {
                    let err = SyncError::UpstreamFailure(err.to_string());
                    ServerMessage::Error { kind: err.kind(), detail: err.to_string() }
                }
                Err(_) => {
                    let err = SyncError::UpstreamTimeout {
                        timeout_ms: deadline.as_millis() as u64,
                    };
                    ServerMessage::Error { kind: err.kind(), detail: err.to_string() }
                }
            };
            let _ = outbound.send(msg);
        });
    }

    fn handle_assist(&mut self, session: SessionId, instruction: String) {
        let Some(member) = self.members.get(&session) else {
            return;
        };
        let outbound = member.outbound.clone();
        let assist = self.manager.assist();
        let deadline = self.manager.config().upstream_timeout;
        let request = AssistRequest {
            context_snippet: self.doc.text().to_string(),
            instruction,
        };

        tokio::spawn(async move {
            let msg = match tokio::time::timeout(deadline, assist.assist(request)).await {
                Ok(Ok(outcome)) => ServerMessage::AiResult { suggestion: outcome.suggestion },
                Ok(Err(err)) => {
                    let err = SyncError::UpstreamFailure(err.to_string());
                    ServerMessage::Error { kind: err.kind(), detail: err.to_string() }
                }
                Err(_) => {
                    let err = SyncError::UpstreamTimeout {
                        timeout_ms: deadline.as_millis() as u64,
                    };
                    ServerMessage::Error { kind: err.kind(), detail: err.to_string() }
                }
            };
            let _ = outbound.send(msg);
        });
    }

    // ── Fan-out ─────────────────────────────────────────────────────────────

    fn broadcast_all(&self, msg: ServerMessage) {
        for member in self.members.values() {
            let _ = member.outbound.send(msg.clone());
        }
    }

    fn broadcast_except(&self, skip: SessionId, msg: ServerMessage) {
        for (id, member) in &self.members {
            if *id != skip {
                let _ = member.outbound.send(msg.clone());
            }
        }
    }
}
