//! Shared server state, constructor-injected into every connection task.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::manager::RoomManager;
use crate::registry::SessionRegistry;
use crate::upstream::{AssistGateway, DisabledAssist, ExecutionBackend, ProcessExecutor};

pub struct AppContext {
    pub config: ServerConfig,
    pub registry: SessionRegistry,
    pub manager: Arc<RoomManager>,
}

impl AppContext {
    pub fn new(
        config: ServerConfig,
        executor: Arc<dyn ExecutionBackend>,
        assist: Arc<dyn AssistGateway>,
    ) -> Arc<Self> {
        let manager = RoomManager::new(config.clone(), executor, assist);
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            manager,
        })
    }

    /// Local subprocess execution, AI assist disabled.
    pub fn with_defaults(config: ServerConfig) -> Arc<Self> {
        Self::new(config, Arc::new(ProcessExecutor), Arc::new(DisabledAssist))
    }
}
