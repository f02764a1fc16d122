//! In-process app wired with fake providers.

#![allow(dead_code)]

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use reelgen_api::{create_router, ApiConfig, AppState};
use reelgen_media::{MediaResult, MixOutput, Mixer};
use reelgen_models::{AssetRef, JobHandle, JobState, JobStatus, MediaKind, MixPlan};
use reelgen_providers::{
    AmbienceRequest, ImageRequest, PollOptions, ProviderAdapter, ProviderError, ProviderResult,
    SpeechRequest, Submission, VideoRequest,
};
use reelgen_storage::LocalAssetStore;
use reelgen_worker::{AssetResolver, Orchestrator, ProviderSet, RunRegistry, WorkerConfig};
use tempfile::TempDir;
use tokio::sync::watch;

/// Provider that answers every submit with a stored file, or never
/// finishes when `hang` is set.
pub struct FakeProvider<P> {
    name: &'static str,
    store: LocalAssetStore,
    kind: MediaKind,
    hang: bool,
    _params: PhantomData<fn(P)>,
}

impl<P> FakeProvider<P> {
    pub fn new(name: &'static str, store: LocalAssetStore, kind: MediaKind, hang: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            store,
            kind,
            hang,
            _params: PhantomData,
        })
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> ProviderAdapter for FakeProvider<P> {
    type Params = P;

    fn name(&self) -> &str {
        self.name
    }

    async fn submit(&self, _params: &P) -> ProviderResult<Submission> {
        if self.hang {
            return Ok(Submission::Queued(JobHandle::new(self.name, "job-1")));
        }
        let asset = self
            .store
            .persist(b"fake-bytes", self.kind, self.kind.default_extension())
            .await?;
        Ok(Submission::Completed(asset))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        Ok(JobStatus::new(JobState::Running))
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef> {
        Err(ProviderError::invalid_response(self.name, format!("no result for {}", handle.id)))
    }
}

/// Mixer that writes a placeholder clip.
pub struct StubMixer;

#[async_trait]
impl Mixer for StubMixer {
    async fn mix(
        &self,
        _plan: &MixPlan,
        output: &Path,
        _cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<MixOutput> {
        tokio::fs::write(output, b"mixed").await?;
        Ok(MixOutput {
            path: output.to_path_buf(),
            duration_secs: 5.0,
        })
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub router: Router,
    pub registry: RunRegistry,
}

/// Build the app; `hanging_video` keeps every video job running.
pub fn test_app(config: ApiConfig, hanging_video: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = LocalAssetStore::new(dir.path(), "/assets");

    let video = |name| FakeProvider::<VideoRequest>::new(name, store.clone(), MediaKind::Video, hanging_video);
    let providers = ProviderSet {
        text: None,
        image: FakeProvider::<ImageRequest>::new("image", store.clone(), MediaKind::Image, false),
        restorers: Vec::new(),
        speech: FakeProvider::<SpeechRequest>::new("speech", store.clone(), MediaKind::Audio, false),
        ambience: FakeProvider::<AmbienceRequest>::new("ambience", store.clone(), MediaKind::Audio, false),
        avatar_video: video("avatar"),
        motion_video: video("motion"),
        lookups: Vec::new(),
    };

    let fast = PollOptions::new(Duration::from_millis(10), Duration::from_secs(30));
    let worker_config = WorkerConfig {
        assets_root: dir.path().to_path_buf(),
        image_poll: fast.clone(),
        video_poll: fast,
        ..WorkerConfig::default()
    };
    let resolver = AssetResolver::new(store).with_public_base_url("https://reelgen.example.com");
    let orchestrator = Orchestrator::new(
        worker_config,
        providers,
        Arc::new(resolver),
        Arc::new(StubMixer),
    );

    let registry = RunRegistry::new(Arc::new(orchestrator));
    let state = AppState::with_registry(config, registry.clone());
    TestApp {
        dir,
        router: create_router(state, None),
        registry,
    }
}
