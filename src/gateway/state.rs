use crate::bus::StreamBus;
use crate::session::SessionRegistry;
use std::sync::Arc;

/// Shared application state for the gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<StreamBus>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(bus: Arc<StreamBus>, registry: Arc<SessionRegistry>) -> Self {
        Self { bus, registry }
    }
}
