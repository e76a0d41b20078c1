// Application state for HTTP handlers
use crate::application::connection_controller::ConnectionController;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ConnectionController>,
    pub stream_interval: Duration,
}
