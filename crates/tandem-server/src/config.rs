//! Server configuration.

use std::time::Duration;

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_PORT, HEARTBEAT_WINDOW, MAX_FRAME_BYTES, ROOM_GRACE_PERIOD,
    TYPING_TIMEOUT, UPSTREAM_TIMEOUT,
};

/// What happens when a client joins a room id the server has never seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Create the room on the fly. This is what the reference client
    /// expects: sharing a room link must work before anyone else is in it.
    #[default]
    AutoCreate,
    /// Reject with `unknownRoom`.
    RequireExisting,
}

/// Runtime knobs for the sync server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub join_policy: JoinPolicy,
    /// How long an empty room survives before teardown.
    pub room_grace: Duration,
    /// Typing indicator lifetime without a refresh.
    pub typing_timeout: Duration,
    /// Max silence on a connection before it is dropped.
    pub heartbeat_window: Duration,
    /// Deadline for execution / AI collaborators.
    pub upstream_timeout: Duration,
    /// Max bytes in one newline-delimited frame.
    pub max_frame_bytes: usize,
}

impl ServerConfig {
    /// Production defaults on the given port.
    pub fn production(port: u16) -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port,
            join_policy: JoinPolicy::default(),
            room_grace: ROOM_GRACE_PERIOD,
            typing_timeout: TYPING_TIMEOUT,
            heartbeat_window: HEARTBEAT_WINDOW,
            upstream_timeout: UPSTREAM_TIMEOUT,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Short timings for tests. Port 0 so the listener picks a free port.
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            join_policy: JoinPolicy::default(),
            room_grace: Duration::from_millis(200),
            typing_timeout: Duration::from_millis(100),
            heartbeat_window: Duration::from_secs(5),
            upstream_timeout: Duration::from_millis(500),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// `host:port` for the TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::production(DEFAULT_PORT)
    }
}

// ============================================================================
// Tests
// ============================================================================
