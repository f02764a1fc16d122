//! Provider client adapters for the reelgen pipeline.
//!
//! Every external capability (image, face restoration, speech, ambience,
//! video) is reached through a [`ProviderAdapter`] that exposes the same
//! submit / poll / fetch contract regardless of whether the provider is
//! synchronous or job based. Provider status vocabularies are mapped to
//! [`reelgen_models::JobState`] through [`StatusTable`]s, and the
//! [`JobPoller`] owns every sleep, retry and timeout.

pub mod adapter;
pub mod audio;
pub mod error;
mod http;
pub mod lookup;
pub mod metrics;
pub mod poller;
pub mod predictions;
pub mod queue;
pub mod requests;
pub mod status;
pub mod text;

pub use adapter::{ProviderAdapter, Submission};
pub use audio::{AmbienceAdapter, AudioConfig, SpeechAdapter};
pub use error::{ProviderError, ProviderResult};
pub use lookup::{FileLookup, HttpFileLookup};
pub use poller::{JobPoller, PollOptions};
pub use predictions::{PredictionsAdapter, PredictionsConfig};
pub use queue::{QueueAdapter, QueueConfig};
pub use requests::{
    AmbienceRequest, ImageRequest, ModelInput, RestoreRequest, SpeechRequest, VideoRequest,
};
pub use status::{StatusTable, PREDICTION_STATUSES, QUEUE_STATUSES};
pub use text::{GeminiConfig, GeminiTextGenerator, TextGenerator, TextRequest};
