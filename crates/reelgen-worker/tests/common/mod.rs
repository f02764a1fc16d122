//! In-memory fakes for pipeline tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reelgen_media::{MediaResult, MixOutput, Mixer};
use reelgen_models::{AssetRef, JobHandle, JobState, JobStatus, MediaKind, MixPlan};
use reelgen_providers::{
    AmbienceRequest, ImageRequest, PollOptions, ProviderAdapter, ProviderError, ProviderResult,
    RestoreRequest, SpeechRequest, Submission, TextGenerator, TextRequest, VideoRequest,
};
use reelgen_storage::{BlobStore, LocalAssetStore, StorageResult};
use reelgen_worker::{AssetResolver, Orchestrator, ProviderSet, WorkerConfig};
use tempfile::TempDir;
use tokio::sync::{watch, Barrier};

/// Scripted text model.
pub struct FakeText {
    replies: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl FakeText {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn complete(&self, _request: &TextRequest) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        Ok(replies.pop().unwrap_or_else(|| "I'd love to help with that!".to_string()))
    }
}

/// Optional rendezvous so tests can prove stages overlap.
#[derive(Clone, Default)]
pub struct Rendezvous(Option<Arc<Barrier>>);

impl Rendezvous {
    pub fn new(parties: usize) -> Self {
        Self(Some(Arc::new(Barrier::new(parties))))
    }

    async fn meet(&self) {
        if let Some(barrier) = &self.0 {
            barrier.wait().await;
        }
    }
}

pub struct FakeImage {
    pub requests: Mutex<Vec<ImageRequest>>,
    pub fail: bool,
    rendezvous: Rendezvous,
}

impl FakeImage {
    pub fn new(rendezvous: Rendezvous) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail: false,
            rendezvous,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
            rendezvous: Rendezvous::default(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for FakeImage {
    type Params = ImageRequest;

    fn name(&self) -> &str {
        "fake-image"
    }

    async fn submit(&self, params: &ImageRequest) -> ProviderResult<Submission> {
        self.requests.lock().unwrap().push(params.clone());
        self.rendezvous.meet().await;
        if self.fail {
            return Err(ProviderError::request("fake-image", 500, "model exploded"));
        }
        Ok(Submission::Queued(JobHandle::new("fake-image", "img-1")))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        Ok(JobStatus::succeeded())
    }

    async fn fetch_result(&self, _handle: &JobHandle) -> ProviderResult<AssetRef> {
        Ok(AssetRef::remote("https://cdn.example.com/image.png"))
    }
}

pub struct FakeRestorer {
    name: String,
    succeed: bool,
    pub calls: AtomicUsize,
}

impl FakeRestorer {
    pub fn new(name: &str, succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            succeed,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProviderAdapter for FakeRestorer {
    type Params = RestoreRequest;

    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, _params: &RestoreRequest) -> ProviderResult<Submission> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Submission::Queued(JobHandle::new(&self.name, "restore-1")))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        if self.succeed {
            Ok(JobStatus::succeeded())
        } else {
            Ok(JobStatus::failed("NSFW content detected"))
        }
    }

    async fn fetch_result(&self, _handle: &JobHandle) -> ProviderResult<AssetRef> {
        Ok(AssetRef::remote(format!("https://cdn.example.com/{}.png", self.name)))
    }
}

/// Synchronous audio provider that writes `bytes` into the asset store,
/// or hands back `asset` untouched when one is set.
pub struct FakeAudio<P> {
    store: LocalAssetStore,
    bytes: Vec<u8>,
    asset: Option<AssetRef>,
    pub requests: Mutex<Vec<P>>,
    rendezvous: Rendezvous,
}

impl<P> FakeAudio<P> {
    pub fn new(store: LocalAssetStore, bytes: &[u8], rendezvous: Rendezvous) -> Arc<Self> {
        Self::build(store, bytes, None, rendezvous)
    }

    pub fn returning(store: LocalAssetStore, asset: AssetRef, rendezvous: Rendezvous) -> Arc<Self> {
        Self::build(store, b"", Some(asset), rendezvous)
    }

    fn build(
        store: LocalAssetStore,
        bytes: &[u8],
        asset: Option<AssetRef>,
        rendezvous: Rendezvous,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            bytes: bytes.to_vec(),
            asset,
            requests: Mutex::new(Vec::new()),
            rendezvous,
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> ProviderAdapter for FakeAudio<P> {
    type Params = P;

    fn name(&self) -> &str {
        "fake-audio"
    }

    async fn submit(&self, params: &P) -> ProviderResult<Submission> {
        self.requests.lock().unwrap().push(params.clone());
        self.rendezvous.meet().await;
        if let Some(asset) = &self.asset {
            return Ok(Submission::Completed(asset.clone()));
        }
        let asset = self.store.persist(&self.bytes, MediaKind::Audio, "mp3").await?;
        Ok(Submission::Completed(asset))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        Ok(JobStatus::succeeded())
    }

    async fn fetch_result(&self, handle: &JobHandle) -> ProviderResult<AssetRef> {
        Err(ProviderError::invalid_response("fake-audio", format!("no job {}", handle.id)))
    }
}

/// Job-based video provider; `hang` keeps every job running.
pub struct FakeVideo {
    name: String,
    store: LocalAssetStore,
    hang: bool,
    pub requests: Mutex<Vec<VideoRequest>>,
    pub cancelled: AtomicBool,
}

impl FakeVideo {
    pub fn new(name: &str, store: LocalAssetStore) -> Arc<Self> {
        Self::build(name, store, false)
    }

    pub fn hanging(name: &str, store: LocalAssetStore) -> Arc<Self> {
        Self::build(name, store, true)
    }

    fn build(name: &str, store: LocalAssetStore, hang: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            store,
            hang,
            requests: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderAdapter for FakeVideo {
    type Params = VideoRequest;

    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, params: &VideoRequest) -> ProviderResult<Submission> {
        self.requests.lock().unwrap().push(params.clone());
        Ok(Submission::Queued(JobHandle::new(&self.name, "video-1")))
    }

    async fn poll(&self, _handle: &JobHandle) -> ProviderResult<JobStatus> {
        if self.hang {
            return Ok(JobStatus::new(JobState::Running).with_progress(10));
        }
        Ok(JobStatus::succeeded())
    }

    async fn fetch_result(&self, _handle: &JobHandle) -> ProviderResult<AssetRef> {
        Ok(self.store.persist(b"fake-mp4", MediaKind::Video, "mp4").await?)
    }

    fn supports_cancel(&self) -> bool {
        true
    }

    async fn cancel(&self, _handle: &JobHandle) -> ProviderResult<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Blob store that counts uploads.
#[derive(Default)]
pub struct MemoryBlob {
    pub puts: AtomicUsize,
}

#[async_trait]
impl BlobStore for MemoryBlob {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://blob.example.com/{}", key))
    }
}

/// Mixer that records the plan and writes a placeholder file.
#[derive(Default)]
pub struct RecordingMixer {
    pub plans: Mutex<Vec<MixPlan>>,
}

#[async_trait]
impl Mixer for RecordingMixer {
    async fn mix(
        &self,
        plan: &MixPlan,
        output: &Path,
        _cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<MixOutput> {
        self.plans.lock().unwrap().push(plan.clone());
        tokio::fs::write(output, b"mixed").await?;
        Ok(MixOutput {
            path: output.to_path_buf(),
            duration_secs: 5.0,
        })
    }
}

impl RecordingMixer {
    pub fn last_plan(&self) -> Option<MixPlan> {
        self.plans.lock().unwrap().last().cloned()
    }
}

/// A wired orchestrator plus handles on every fake.
pub struct Harness {
    pub dir: TempDir,
    pub orchestrator: Arc<Orchestrator>,
    pub text: Option<Arc<FakeText>>,
    pub image: Arc<FakeImage>,
    pub restorers: Vec<Arc<FakeRestorer>>,
    pub speech: Arc<FakeAudio<SpeechRequest>>,
    pub ambience: Arc<FakeAudio<AmbienceRequest>>,
    pub avatar: Arc<FakeVideo>,
    pub motion: Arc<FakeVideo>,
    pub blob: Arc<MemoryBlob>,
    pub mixer: Arc<RecordingMixer>,
}

pub struct HarnessBuilder {
    text: Option<Arc<FakeText>>,
    rendezvous: Rendezvous,
    voice_bytes: Vec<u8>,
    voice_asset: Option<AssetRef>,
    failing_image: bool,
    hanging_video: bool,
    video_timeout: Duration,
    restorers: Vec<Arc<FakeRestorer>>,
    max_runs: usize,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            text: None,
            rendezvous: Rendezvous::default(),
            voice_bytes: b"ID3voice".to_vec(),
            voice_asset: None,
            failing_image: false,
            hanging_video: false,
            video_timeout: Duration::from_secs(30),
            restorers: Vec::new(),
            max_runs: 2,
        }
    }

    pub fn text(mut self, replies: &[&str]) -> Self {
        self.text = Some(FakeText::new(replies));
        self
    }

    /// Require `parties` synthesis calls to be in flight at once.
    pub fn rendezvous(mut self, parties: usize) -> Self {
        self.rendezvous = Rendezvous::new(parties);
        self
    }

    pub fn voice_bytes(mut self, bytes: &[u8]) -> Self {
        self.voice_bytes = bytes.to_vec();
        self
    }

    /// Speech provider hands back this asset instead of writing one.
    pub fn voice_asset(mut self, asset: AssetRef) -> Self {
        self.voice_asset = Some(asset);
        self
    }

    pub fn video_timeout(mut self, timeout: Duration) -> Self {
        self.video_timeout = timeout;
        self
    }

    pub fn failing_image(mut self) -> Self {
        self.failing_image = true;
        self
    }

    pub fn hanging_video(mut self) -> Self {
        self.hanging_video = true;
        self
    }

    pub fn restorers(mut self, restorers: Vec<Arc<FakeRestorer>>) -> Self {
        self.restorers = restorers;
        self
    }

    pub fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = LocalAssetStore::new(dir.path(), "/assets");

        let image = if self.failing_image {
            FakeImage::failing()
        } else {
            FakeImage::new(self.rendezvous.clone())
        };
        let speech = match self.voice_asset {
            Some(asset) => FakeAudio::<SpeechRequest>::returning(store.clone(), asset, self.rendezvous.clone()),
            None => FakeAudio::<SpeechRequest>::new(store.clone(), &self.voice_bytes, self.rendezvous.clone()),
        };
        let ambience = FakeAudio::<AmbienceRequest>::new(store.clone(), b"ID3bed", self.rendezvous.clone());
        let (avatar, motion) = if self.hanging_video {
            (FakeVideo::hanging("fake-avatar", store.clone()), FakeVideo::hanging("fake-motion", store.clone()))
        } else {
            (FakeVideo::new("fake-avatar", store.clone()), FakeVideo::new("fake-motion", store.clone()))
        };
        let blob = Arc::new(MemoryBlob::default());
        let mixer = Arc::new(RecordingMixer::default());

        let providers = ProviderSet {
            text: self.text.clone().map(|t| t as Arc<dyn TextGenerator>),
            image: image.clone(),
            restorers: self
                .restorers
                .iter()
                .map(|r| r.clone() as Arc<dyn ProviderAdapter<Params = RestoreRequest>>)
                .collect(),
            speech: speech.clone(),
            ambience: ambience.clone(),
            avatar_video: avatar.clone(),
            motion_video: motion.clone(),
            lookups: Vec::new(),
        };

        let fast = PollOptions::new(Duration::from_millis(10), Duration::from_secs(30));
        let config = WorkerConfig {
            assets_root: dir.path().to_path_buf(),
            image_poll: fast,
            video_poll: PollOptions::new(Duration::from_millis(10), self.video_timeout),
            max_concurrent_runs: self.max_runs,
            ..WorkerConfig::default()
        };

        let resolver = AssetResolver::new(store).with_blob_store(blob.clone());
        let orchestrator = Arc::new(Orchestrator::new(
            config,
            providers,
            Arc::new(resolver),
            mixer.clone(),
        ));

        Harness {
            dir,
            orchestrator,
            text: self.text,
            image,
            restorers: self.restorers,
            speech,
            ambience,
            avatar,
            motion,
            blob,
            mixer,
        }
    }
}
