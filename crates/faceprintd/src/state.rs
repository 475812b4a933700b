use std::sync::Arc;

use faceprint_store::ProfileStore;

use crate::config::Config;
use crate::engine::EngineHandle;

/// Shared state handed to every request handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: EngineHandle,
    pub store: ProfileStore,
}

impl AppState {
    pub fn new(config: Config, engine: EngineHandle, store: ProfileStore) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            store,
        }
    }
}
