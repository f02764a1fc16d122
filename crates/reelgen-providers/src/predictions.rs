//! Prediction-style job API client (`POST /v1/predictions`, poll by id).

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reelgen_models::{AssetRef, JobHandle, JobState, JobStatus};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::adapter::{ProviderAdapter, Submission};
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_response};
use crate::metrics;
use crate::requests::ModelInput;
use crate::status::PREDICTION_STATUSES;

/// Configuration for one prediction-backed model.
#[derive(Debug, Clone)]
pub struct PredictionsConfig {
    /// Adapter name (e.g. "codeformer")
    pub name: String,
    /// API base URL
    pub base_url: String,
    pub api_token: String,
    /// `owner/name` for official models, or a bare version hash
    pub model: String,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl PredictionsConfig {
    pub fn new(name: impl Into<String>, api_token: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: "https://api.replicate.com".to_string(),
            api_token: api_token.into(),
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

    fn is_version_hash(&self) -> bool {
        !self.model.contains('/')
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    logs: Option<String>,
}

/// The output shapes prediction models actually return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Url(String),
    Urls(Vec<String>),
    File { url: String },
}

impl PredictionOutput {
    fn first_url(&self) -> Option<&str> {
        match self {
            PredictionOutput::Url(url) => Some(url),
            PredictionOutput::Urls(urls) => urls.first().map(String::as_str),
            PredictionOutput::File { url } => Some(url),
        }
    }
}

impl Prediction {
    fn error_text(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    fn status(&self) -> JobStatus {
        let mut status = JobStatus::new(PREDICTION_STATUSES.map(&self.status));
        if let Some(progress) = self.logs.as_deref().and_then(parse_log_progress) {
            status = status.with_progress(progress);
        }
        if let Some(error) = self.error_text() {
            status = status.with_error(error);
        }
        status
    }
}

/// Last `NN%` in a progress-bar style log, if any.
fn parse_log_progress(logs: &str) -> Option<u8> {
    logs.rmatch_indices('%').find_map(|(idx, _)| {
        let digits: String = logs[..idx]
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        digits.parse::<u32>().ok().map(|p| p.min(100) as u8)
    })
}

/// Adapter for one prediction-backed model.
pub struct PredictionsAdapter<P> {
    http: Client,
    config: PredictionsConfig,
    _params: PhantomData<fn(&P)>,
}

impl<P> PredictionsAdapter<P> {
    pub fn new(config: PredictionsConfig) -> ProviderResult<Self> {
        if config.api_token.trim().is_empty() {
            return Err(ProviderError::config(format!(
                "{}: API token is empty",
                config.name
            )));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
            _params: PhantomData,
        })
    }

    async fn get_prediction(&self, id: &str) -> ProviderResult<Prediction> {
        let url = format!("{}/v1/predictions/{}", self.config.base(), id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let response = check_response(&self.config.name, response).await?;
        Ok(response.json().await?)
    }

    fn output_asset(&self, prediction: &Prediction) -> ProviderResult<AssetRef> {
        prediction
            .output
            .as_ref()
            .and_then(PredictionOutput::first_url)
            .map(AssetRef::remote)
            .ok_or_else(|| {
                ProviderError::invalid_response(
                    &self.config.name,
                    format!("prediction {} succeeded without an output URL", prediction.id),
                )
            })
    }
}

#[async_trait]
impl<P> ProviderAdapter for PredictionsAdapter<P>
where
    P: ModelInput + Send + Sync,
{
    type Params = P;

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn submit(&self, params: &P) -> ProviderResult<Submission> {
        let (url, body) = if self.config.is_version_hash() {
            (
                format!("{}/v1/predictions", self.config.base()),
                json!({ "version": self.config.model, "input": params.to_input() }),
            )
        } else {
            (
                format!("{}/v1/models/{}/predictions", self.config.base(), self.config.model),
                json!({ "input": params.to_input() }),
            )
        };

        debug!(provider = %self.config.name, model = %self.config.model, "Submitting prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;
        let response = check_response(&self.config.name, response).await?;
        let prediction: Prediction = response.json().await?;

        metrics::record_submit(&self.config.name);

        match PREDICTION_STATUSES.map(&prediction.status) {
            JobState::Succeeded => Ok(Submission::Completed(self.output_asset(&prediction)?)),
            state @ (JobState::Failed | JobState::Canceled) => Err(ProviderError::JobFailed {
                provider: self.config.name.clone(),
                state,
                message: prediction
                    .error_text()
                    .unwrap_or_else(|| "prediction rejected".to_string()),
            }),
            _ => Ok(Submission::Queued(JobHandle::new(&self.config.name, prediction.id))),
        }
    }

    async fn poll(&self, handle: &JobHandle) -> ProviderResult<JobStatus> {
        Ok(self.get_prediction(&handle.id).await?.status())
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef> {
        let prediction = self.get_prediction(&handle.id).await?;
        self.output_asset(&prediction)
    }

    fn supports_cancel(&self) -> bool {
        true
    }

    async fn cancel(&self, handle: &JobHandle) -> ProviderResult<()> {
        let url = format!("{}/v1/predictions/{}/cancel", self.config.base(), handle.id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        check_response(&self.config.name, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::RestoreRequest;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> PredictionsAdapter<RestoreRequest> {
        PredictionsAdapter::new(
            PredictionsConfig::new("codeformer", "r8_test", "sczhou/codeformer")
                .with_base_url(server.uri()),
        )
        .unwrap()
    }

    fn restore() -> RestoreRequest {
        RestoreRequest {
            image_url: "https://cdn.example.com/a.png".into(),
        }
    }

    #[test]
    fn test_parse_log_progress() {
        assert_eq!(parse_log_progress(" 10%|# | 1/10\n 45%|####  | 9/20"), Some(45));
        assert_eq!(parse_log_progress("loading weights"), None);
    }

    #[tokio::test]
    async fn test_submit_queues_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/sczhou/codeformer/predictions"))
            .and(header("authorization", "Bearer r8_test"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "p1", "status": "starting"})),
            )
            .mount(&server)
            .await;

        let submission = adapter(&server).submit(&restore()).await.unwrap();
        assert_eq!(submission, Submission::Queued(JobHandle::new("codeformer", "p1")));
    }

    #[tokio::test]
    async fn test_poll_maps_status_and_fetches_output() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1",
                "status": "succeeded",
                "output": ["https://replicate.delivery/out.png"],
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let handle = JobHandle::new("codeformer", "p1");
        let status = adapter.poll(&handle).await.unwrap();
        assert_eq!(status.state, JobState::Succeeded);

        let asset = adapter.fetch_result(&handle).await.unwrap();
        assert_eq!(asset, AssetRef::remote("https://replicate.delivery/out.png"));
    }

    #[tokio::test]
    async fn test_failed_prediction_forwards_error_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p2",
                "status": "failed",
                "error": "CUDA out of memory",
            })))
            .mount(&server)
            .await;

        let status = adapter(&server)
            .poll(&JobHandle::new("codeformer", "p2"))
            .await
            .unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("CUDA out of memory"));
    }

    #[tokio::test]
    async fn test_submit_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_string(r#"{"detail":"Request was throttled."}"#),
            )
            .mount(&server)
            .await;

        let err = adapter(&server).submit(&restore()).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_non_2xx_keeps_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string(r#"{"detail":"image: invalid URL"}"#),
            )
            .mount(&server)
            .await;

        let err = adapter(&server).submit(&restore()).await.unwrap_err();
        match err {
            ProviderError::Request { status, message, .. } => {
                assert_eq!(status, 422);
                assert_eq!(message, r#"{"detail":"image: invalid URL"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
