//! Generation pipeline orchestrator.
//!
//! This crate turns a [`reelgen_models::GenerationIntent`] into a finished
//! clip: it drafts the creative brief, fans out image, speech and ambience
//! synthesis, resolves intermediate assets for the video provider and
//! hands the final composition to the mixing engine.

pub mod brief;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod persona;
pub mod plan;
pub mod providers;
pub mod resolver;
pub mod status;

pub use brief::{choose_flow, heuristic_brief, BriefDrafter};
pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult, RunError, StageExt};
pub use executor::RunRegistry;
pub use logging::RunLogger;
pub use orchestrator::Orchestrator;
pub use plan::{build_mix_plan, MixInputs};
pub use providers::ProviderSet;
pub use resolver::{AssetResolver, RunAssets};
pub use status::StatusHandle;
