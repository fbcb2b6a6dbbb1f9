use std::sync::Arc;

use crate::config::Config;
use crate::engine::{Engine, EngineSettings};
use crate::persistence::Persistence;
use crate::store::EntityStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Arc<Config>,
}

impl AppState {
    /// State over an already-hydrated store.
    pub fn new(config: Config, store: EntityStore, persistence: Option<Persistence>) -> Self {
        let engine = Engine::new(EngineSettings::from(&config), store, persistence);
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    /// In-memory state with no persistence.
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, EntityStore::new(), None)
    }
}
