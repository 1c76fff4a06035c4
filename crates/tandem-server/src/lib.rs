//! The tandem sync server: rooms, shared documents, presence, chat.
//!
//! Architecture in one paragraph: the [`gateway`] turns TCP connections
//! into typed message streams; the [`manager`] maps room ids to room actor
//! tasks; each [`room`] task owns its document (`tandem-ot`), presence, and
//! chat, serialized through a single command queue; the [`registry`] tracks
//! live sessions and makes disconnects idempotent; [`upstream`] hosts the
//! execution and AI collaborator seams.

pub mod chat;
pub mod config;
pub mod constants;
pub mod context;
pub mod gateway;
pub mod manager;
pub mod presence;
pub mod registry;
pub mod room;
pub mod upstream;

pub use config::{JoinPolicy, ServerConfig};
pub use context::AppContext;
pub use gateway::Gateway;
pub use manager::{RoomLifecycle, RoomManager};
pub use registry::SessionRegistry;
pub use room::{RoomCommand, RoomHandle};
pub use upstream::{
    AssistGateway, AssistOutcome, AssistRequest, DisabledAssist, ExecOutcome, ExecRequest,
    ExecutionBackend, ProcessExecutor, UpstreamError,
};
