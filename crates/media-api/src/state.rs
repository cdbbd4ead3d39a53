use std::sync::Arc;

use media_core::{EngineConfig, MediaEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MediaEngine>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_engine(Arc::new(MediaEngine::from_config(config)))
    }

    pub fn with_engine(engine: Arc<MediaEngine>) -> Self {
        Self { engine }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
