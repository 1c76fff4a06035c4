//! TCP transport gateway.
//!
//! Frames are newline-delimited JSON over plain TCP. Each connection gets a
//! reader (this task) and a writer task joined by the session's outbound
//! channel; the room and collaborator tasks only ever see the channel, never
//! the socket.
//!
//! Connection teardown is funneled through one exit path: whatever ends the
//! read loop (explicit `leave`, EOF, frame error, heartbeat timeout, or the
//! writer closing after a fatal error), the registry release runs once and
//! the room gets exactly one `Leave`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use futures::{SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use tandem_types::{ClientMessage, ServerMessage, Session, SyncError};

use crate::context::AppContext;
use crate::room::{RoomCommand, RoomHandle};

pub struct Gateway {
    ctx: Arc<AppContext>,
}

impl Gateway {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.ctx.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!(addr = %listener.local_addr()?, "listening");
        self.serve(listener).await
    }

    /// Accept loop over an already-bound listener (tests bind port 0 and
    /// pass the listener in).
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, addr) = listener.accept().await.context("accept")?;
            debug!(%addr, "connection accepted");
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(ctx, stream, addr).await {
                    debug!(%addr, "connection error: {err:#}");
                }
            });
        }
    }
}

async fn handle_connection(
    ctx: Arc<AppContext>,
    stream: TcpStream,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let framed = Framed::new(
        stream,
        LinesCodec::new_with_max_length(ctx.config.max_frame_bytes),
    );
    let (mut sink, mut frames) = framed.split();

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Writer: drains the outbound channel onto the socket. Closes the
    // connection itself right after delivering a fatal error.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let fatal = matches!(&msg, ServerMessage::Error { kind, .. } if kind.is_fatal());
            match serde_json::to_string(&msg) {
                Ok(line) => {
                    if sink.send(line).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!("unserializable server message: {err}"),
            }
            if fatal {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // First frame must establish a room.
    let (handle, session) = match establish(&ctx, &mut frames, &outbound).await {
        Some(joined) => joined,
        None => {
            drop(outbound);
            let _ = writer.await;
            return Ok(());
        }
    };
    ctx.registry.register(&session);
    let session_id = session.id;
    info!(%addr, session = %session_id, room = %session.room, "session established");

    // Main dispatch loop.
    loop {
        tokio::select! {
            // Writer gone: fatal error was delivered or the socket died.
            _ = &mut writer => break,

            next = timeout(ctx.config.heartbeat_window, frames.next()) => {
                let line = match next {
                    Err(_) => {
                        debug!(session = %session_id, "heartbeat timeout");
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(err))) => {
                        debug!(session = %session_id, "frame error: {err}");
                        break;
                    }
                    Ok(Some(Ok(line))) => line,
                };

                let msg = match serde_json::from_str::<ClientMessage>(&line) {
                    Ok(msg) => msg,
                    Err(err) => {
                        send_error(&outbound, &SyncError::Protocol(format!("bad frame: {err}")));
                        continue;
                    }
                };

                match msg {
                    ClientMessage::Ping => {
                        let _ = outbound.send(ServerMessage::Pong);
                    }
                    ClientMessage::Leave => break,
                    ClientMessage::Join { .. } | ClientMessage::CreateRoom { .. } => {
                        send_error(
                            &outbound,
                            &SyncError::Protocol("already joined a room".to_string()),
                        );
                    }
                    other => {
                        if !dispatch(&handle, session_id, other) {
                            // Room reaped under us; nothing left to talk to.
                            break;
                        }
                    }
                }
            }
        }
    }

    // Exactly-once teardown: the registry removal is the gate.
    if let Some(record) = ctx.registry.release(session_id) {
        if let Some(room) = ctx.manager.get(&record.room) {
            room.send(RoomCommand::Leave { session: session_id });
        }
        info!(session = %session_id, "session released");
    }

    drop(outbound);
    // The room drops its sender when the Leave lands; the writer then
    // drains and exits.
    let _ = writer.await;
    Ok(())
}

/// Handle the pre-join phase: one frame, which must be `join` or
/// `createRoom`. `None` means the connection is done (error already queued).
async fn establish(
    ctx: &Arc<AppContext>,
    frames: &mut (impl Stream<Item = Result<String, tokio_util::codec::LinesCodecError>> + Unpin),
    outbound: &mpsc::UnboundedSender<ServerMessage>,
) -> Option<(RoomHandle, Session)> {
    let first = match timeout(ctx.config.heartbeat_window, frames.next()).await {
        Ok(Some(Ok(line))) => line,
        _ => return None,
    };

    match serde_json::from_str::<ClientMessage>(&first) {
        Ok(ClientMessage::Join { room, display_name }) => {
            match ctx.manager.join(&room, &display_name, outbound.clone()).await {
                Ok(joined) => Some(joined),
                Err(err) => {
                    send_error(outbound, &err);
                    None
                }
            }
        }
        Ok(ClientMessage::CreateRoom { display_name }) => {
            let handle = ctx.manager.create_room();
            let _ = outbound.send(ServerMessage::RoomCreated { room: handle.id.clone() });
            match handle.join(display_name, outbound.clone()).await {
                Some(session) => Some((handle, session)),
                None => {
                    warn!(room = %handle.id, "freshly created room refused a join");
                    None
                }
            }
        }
        Ok(_) | Err(_) => {
            send_error(
                outbound,
                &SyncError::Protocol("first message must be join or createRoom".to_string()),
            );
            None
        }
    }
}

/// Route a post-join client message into the room queue. Returns false when
/// the room's queue is closed.
fn dispatch(handle: &RoomHandle, session: tandem_types::SessionId, msg: ClientMessage) -> bool {
    let cmd = match msg {
        ClientMessage::EditOp(op) => RoomCommand::Edit { session, op },
        ClientMessage::CursorUpdate { position, selection } => {
            RoomCommand::Cursor { session, position, selection }
        }
        ClientMessage::Typing { typing } => RoomCommand::Typing { session, typing },
        ClientMessage::ChatPost { text } => RoomCommand::Chat { session, text },
        ClientMessage::ExecuteRequest { language, stdin } => {
            RoomCommand::Execute { session, language, stdin }
        }
        ClientMessage::AiRequest { instruction } => RoomCommand::Assist { session, instruction },
        // Handled by the caller.
        ClientMessage::Join { .. }
        | ClientMessage::CreateRoom { .. }
        | ClientMessage::Leave
        | ClientMessage::Ping => return true,
    };
    handle.send(cmd)
}

fn send_error(outbound: &mpsc::UnboundedSender<ServerMessage>, err: &SyncError) {
    let _ = outbound.send(ServerMessage::Error {
        kind: err.kind(),
        detail: err.to_string(),
    });
}
