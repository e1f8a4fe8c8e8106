use crate::config::ServerConfig;
use crate::dispatch::{BulkCoordinator, DispatchEngine};
use crate::server::rate_limit::SubmissionLimiter;

#[derive(Clone)]
pub struct AppState {
    pub engine: DispatchEngine,
    pub bulk: BulkCoordinator,
    pub server_config: Option<ServerConfig>,
    pub submission_limiter: Option<SubmissionLimiter>,
}

impl AppState {
    pub fn new(engine: DispatchEngine, server_config: Option<ServerConfig>) -> Self {
        let submission_limiter = server_config
            .as_ref()
            .and_then(|cfg| cfg.rate_limit.as_ref())
            .and_then(SubmissionLimiter::from_config);
        Self {
            bulk: BulkCoordinator::new(engine.clone()),
            engine,
            server_config,
            submission_limiter,
        }
    }
}
