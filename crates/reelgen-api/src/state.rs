//! Application state.

use std::sync::Arc;

use reelgen_storage::LocalAssetStore;
use reelgen_worker::{Orchestrator, PipelineError, RunRegistry, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: RunRegistry,
    /// Public asset directory served under `/assets`
    pub assets: LocalAssetStore,
}

impl AppState {
    /// Wire the production orchestrator from environment variables.
    pub async fn new(config: ApiConfig) -> Result<Self, PipelineError> {
        let orchestrator = Orchestrator::from_config(WorkerConfig::from_env()).await?;
        Ok(Self::with_registry(config, RunRegistry::new(Arc::new(orchestrator))))
    }

    /// Build state around an existing registry.
    pub fn with_registry(config: ApiConfig, registry: RunRegistry) -> Self {
        let assets = registry.orchestrator().local_store().clone();
        Self {
            config,
            registry,
            assets,
        }
    }
}
