//! Application state.

use coach_core::SessionOrchestrator;
use coach_core::auth::ServiceToken;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
#[allow(dead_code)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Session operations and background jobs
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Service token for front-end authentication
    pub service_token: Arc<ServiceToken>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<SessionOrchestrator>,
        service_token: ServiceToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            service_token: Arc::new(service_token),
            start_time: Instant::now(),
        }
    }
}
