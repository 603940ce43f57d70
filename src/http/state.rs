use crate::config::Config;
use crate::credentials::CredentialPool;
use crate::pipeline::Pipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<CredentialPool>,
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: Arc<CredentialPool>, http: reqwest::Client, config: Arc<Config>) -> Self {
        let pipeline = Arc::new(Pipeline::new(pool.clone(), http));
        Self {
            pool,
            pipeline,
            config,
        }
    }

    /// Build state around an already-constructed pipeline — the mock-upstream
    /// integration tests use this to point the pipeline at a local server
    /// instead of the real CodeAssist endpoint.
    pub fn with_pipeline(pool: Arc<CredentialPool>, pipeline: Arc<Pipeline>, config: Arc<Config>) -> Self {
        Self {
            pool,
            pipeline,
            config,
        }
    }
}
