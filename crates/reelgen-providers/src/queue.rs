//! Queue-style job API client (submit to a model path, poll
//! `/requests/{id}/status`, fetch `/requests/{id}`).

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reelgen_models::{AssetRef, JobHandle, JobState, JobStatus};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::adapter::{ProviderAdapter, Submission};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_response};
use crate::metrics;
use crate::requests::ModelInput;
use crate::status::QUEUE_STATUSES;

/// Configuration for one queue-backed model.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Adapter name (also the provider name on returned file handles)
    pub name: String,
    /// Queue base URL
    pub base_url: String,
    pub api_key: String,
    /// Model path, e.g. `fal-ai/flux/dev`
    pub model: String,
    pub timeout: Duration,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: "https://queue.fal.run".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Request paths live under the first two model segments
    /// (`fal-ai/flux/dev` polls under `fal-ai/flux`).
    fn app_path(&self) -> String {
        self.model
            .trim_matches('/')
            .split('/')
            .take(2)
            .collect::<Vec<_>>()
            .join("/")
    }

    fn request_url(&self, id: &str, suffix: &str) -> String {
        format!("{}/{}/requests/{}{}", self.base(), self.app_path(), id, suffix)
    }
}

#[derive(Debug, Deserialize)]
struct QueueSubmitResponse {
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    queue_position: Option<u32>,
}

/// File object as returned in queue results.
#[derive(Debug, Clone, Deserialize)]
struct QueueFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

/// The result keys queue models put their primary output under.
#[derive(Debug, Deserialize)]
struct QueueOutput {
    #[serde(default)]
    video: Option<QueueFile>,
    #[serde(default)]
    image: Option<QueueFile>,
    #[serde(default)]
    images: Vec<QueueFile>,
    #[serde(default)]
    audio: Option<QueueFile>,
    #[serde(default)]
    audio_file: Option<QueueFile>,
}

impl QueueOutput {
    fn primary(self) -> Option<QueueFile> {
        self.video
            .or(self.image)
            .or_else(|| self.images.into_iter().next())
            .or(self.audio)
            .or(self.audio_file)
    }
}

/// Adapter for one queue-backed model.
pub struct QueueAdapter<P> {
    http: Client,
    config: QueueConfig,
    _params: PhantomData<fn(&P)>,
}

impl<P> QueueAdapter<P> {
    pub fn new(config: QueueConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config(format!("{}: API key is empty", config.name)));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            _params: PhantomData,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, format!("Key {}", self.config.api_key))
    }

    fn file_to_asset(&self, file: QueueFile) -> ProviderResult<AssetRef> {
        if let Some(url) = file.url.filter(|u| !u.trim().is_empty()) {
            if let Some(data) = url.strip_prefix("data:") {
                return decode_data_uri(&self.config.name, data, file.content_type);
            }
            return Ok(AssetRef::remote(url));
        }
        if let Some(file_id) = file.file_id {
            return Ok(AssetRef::provider_handle(&self.config.name, file_id));
        }
        Err(ProviderError::invalid_response(
            &self.config.name,
            "result file has neither url nor file_id",
        ))
    }
}

/// Decode the part of a `data:` URI after the scheme.
fn decode_data_uri(
    provider: &str,
    data: &str,
    content_type: Option<String>,
) -> ProviderResult<AssetRef> {
    let (meta, payload) = data
        .split_once(',')
        .ok_or_else(|| ProviderError::invalid_response(provider, "malformed data URI"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ProviderError::invalid_response(provider, "data URI is not base64"))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ProviderError::invalid_response(provider, format!("bad base64: {}", e)))?;
    let mime = if mime.is_empty() {
        content_type.unwrap_or_else(|| "application/octet-stream".to_string())
    } else {
        mime.to_string()
    };
    Ok(AssetRef::inline(bytes, mime))
}

#[async_trait]
impl<P> ProviderAdapter for QueueAdapter<P>
where
    P: ModelInput + Send + Sync,
{
    type Params = P;

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn submit(&self, params: &P) -> ProviderResult<Submission> {
        let url = format!("{}/{}", self.config.base(), self.config.model.trim_matches('/'));
        debug!(provider = %self.config.name, model = %self.config.model, "Submitting queue request");

        let response = self
            .authed(self.http.post(&url))
            .json(&params.to_input())
            .send()
            .await?;
        let response = check_response(&self.config.name, response).await?;
        let submitted: QueueSubmitResponse = response.json().await?;

        metrics::record_submit(&self.config.name);
        Ok(Submission::Queued(JobHandle::new(
            &self.config.name,
            submitted.request_id,
        )))
    }

    async fn poll(&self, handle: &JobHandle) -> ProviderResult<JobStatus> {
        let url = self.config.request_url(&handle.id, "/status");
        let response = self.authed(self.http.get(&url)).send().await?;
        let response = check_response(&self.config.name, response).await?;
        let body: QueueStatusResponse = response.json().await?;

        let mut state = QUEUE_STATUSES.map(&body.status);
        // Completed with an error body is a failure
        if state == JobState::Succeeded && body.error.is_some() {
            state = JobState::Failed;
        }
        if let Some(position) = body.queue_position {
            debug!(provider = %self.config.name, job_id = %handle.id, position, "Queued");
        }

        let mut status = JobStatus::new(state);
        if let Some(error) = body.error {
            status = status.with_error(error);
        }
        Ok(status)
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef> {
        let url = self.config.request_url(&handle.id, "");
        let response = self.authed(self.http.get(&url)).send().await?;
        let response = check_response(&self.config.name, response).await?;
        let output: QueueOutput = response.json().await?;
        let file = output.primary().ok_or_else(|| {
            ProviderError::invalid_response(
                &self.config.name,
                format!("request {} returned no media output", handle.id),
            )
        })?;
        self.file_to_asset(file)
    }

    fn supports_cancel(&self) -> bool {
        true
    }

    async fn cancel(&self, handle: &JobHandle) -> ProviderResult<()> {
        let url = self.config.request_url(&handle.id, "/cancel");
        let response = self.authed(self.http.put(&url)).send().await?;
        check_response(&self.config.name, response).await?;
        Ok(())
    }
}
