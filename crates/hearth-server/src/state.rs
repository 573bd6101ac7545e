use std::sync::Arc;

use hearth_core::actor::ActorRegistry;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ActorRegistry>,
    /// Instance used when a request doesn't name one
    pub default_instance: Arc<str>,
}

impl AppState {
    pub fn new(registry: Arc<ActorRegistry>, default_instance: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            default_instance: default_instance.into(),
        }
    }
}
