//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default TCP port for the tandem sync server.
pub const DEFAULT_PORT: u16 = 4520;

/// Default bind address (localhost only for security).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// How long an empty room lingers before it is torn down.
pub const ROOM_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Typing indicator lifetime without a refresh.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(4);

/// A connection that sends nothing (not even a ping) for this long is
/// considered dead.
pub const HEARTBEAT_WINDOW: Duration = Duration::from_secs(45);

/// Deadline for execution / AI collaborators to respond.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a single newline-delimited frame.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;
