//! Asset resolution bridge.
//!
//! Video synthesis providers only accept URLs they can fetch themselves.
//! [`RunAssets`] turns any [`AssetRef`] into such a URL, rehosting inline
//! bytes and locally hosted files through the blob store and exchanging
//! provider handles through the provider's file lookup. Results are
//! memoized per run, and concurrent resolutions of the same reference
//! share one upload.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reelgen_models::asset::{is_absolute_http_url, is_loopback_url};
use reelgen_models::{AssetRef, MediaKind};
use reelgen_providers::FileLookup;
use reelgen_storage::{object_key, BlobStore, LocalAssetStore};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Content type for a file, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Shared resolution machinery: stores, lookups and the HTTP client.
pub struct AssetResolver {
    local: LocalAssetStore,
    blob: Option<Arc<dyn BlobStore>>,
    lookups: HashMap<String, Arc<dyn FileLookup>>,
    public_base_url: Option<String>,
    same_origin: HashSet<String>,
    http: reqwest::Client,
}

impl AssetResolver {
    pub fn new(local: LocalAssetStore) -> Self {
        Self {
            local,
            blob: None,
            lookups: HashMap::new(),
            public_base_url: None,
            same_origin: HashSet::new(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_blob_store(mut self, blob: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(blob);
        self
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn FileLookup>) -> Self {
        self.lookups.insert(lookup.provider().to_string(), lookup);
        self
    }

    /// Origin the public asset directory is served from. Loopback origins
    /// are ignored since no external provider can reach them.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if is_absolute_http_url(&base_url) && !is_loopback_url(&base_url) {
            self.public_base_url = Some(base_url.trim_end_matches('/').to_string());
        } else {
            warn!(base_url = %base_url, "Public base URL is not externally reachable, local assets will be uploaded");
        }
        self
    }

    /// Provider that shares our origin and accepts relative asset paths.
    pub fn with_same_origin_provider(mut self, provider: impl Into<String>) -> Self {
        self.same_origin.insert(provider.into());
        self
    }

    pub fn local_store(&self) -> &LocalAssetStore {
        &self.local
    }

    /// Start a per-run memoizing view.
    pub fn for_run(self: &Arc<Self>) -> RunAssets {
        RunAssets {
            resolver: Arc::clone(self),
            cache: Mutex::new(HashMap::new()),
            uploads: AtomicUsize::new(0),
        }
    }

    async fn download(&self, url: &str, label: &str) -> PipelineResult<(Vec<u8>, Option<String>)> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::asset_resolution(label, format!("download failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::asset_resolution(
                label,
                format!("download returned {}: {}", status.as_u16(), body),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::asset_resolution(label, format!("download failed: {}", e)))?;
        Ok((bytes.to_vec(), content_type))
    }

    async fn lookup(&self, provider: &str, file_id: &str, label: &str) -> PipelineResult<String> {
        let lookup = self.lookups.get(provider).ok_or_else(|| {
            PipelineError::asset_resolution(label, format!("no file lookup registered for {}", provider))
        })?;
        let url = lookup
            .lookup(file_id)
            .await
            .map_err(|e| PipelineError::asset_resolution(label, e.to_string()))?;
        if !is_absolute_http_url(&url) {
            return Err(PipelineError::asset_resolution(
                label,
                format!("{} lookup returned a non-absolute URL: {}", provider, url),
            ));
        }
        Ok(url)
    }
}

/// Memoizing resolver scoped to one run.
pub struct RunAssets {
    resolver: Arc<AssetResolver>,
    cache: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
    uploads: AtomicUsize,
}

impl RunAssets {
    /// Number of blob uploads this run has performed.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Drop a memoized URL, e.g. after a presigned URL expired.
    pub fn invalidate(&self, asset: &AssetRef) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&cache_key(asset));
        }
    }

    /// Produce a URL `target` can fetch for `asset`.
    ///
    /// Fails when no absolute URL can be produced; an unusable handle is
    /// never passed through.
    pub async fn resolve(&self, asset: &AssetRef, target: &str) -> PipelineResult<String> {
        if self.resolver.same_origin.contains(target) {
            match asset {
                AssetRef::Local { public_path, .. } => return Ok(public_path.clone()),
                AssetRef::Remote { url } if url.starts_with('/') => return Ok(url.clone()),
                _ => {}
            }
        }

        let cell = {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| PipelineError::asset_resolution(asset.describe(), "resolver cache poisoned"))?;
            Arc::clone(cache.entry(cache_key(asset)).or_default())
        };

        let url = cell
            .get_or_try_init(|| self.resolve_uncached(asset, target))
            .await?;
        Ok(url.clone())
    }

    async fn resolve_uncached(&self, asset: &AssetRef, target: &str) -> PipelineResult<String> {
        let label = asset.describe();
        let resolver = &self.resolver;
        debug!(asset = %label, target = %target, "Resolving asset");

        let url = match asset {
            AssetRef::Inline { bytes, mime_type } => {
                self.upload(bytes.clone(), mime_type, "inline", &label).await?
            }
            AssetRef::ProviderHandle { provider, file_id } => {
                resolver.lookup(provider, file_id, &label).await?
            }
            AssetRef::Local { path, public_path } => {
                self.hosted_url(path, public_path, &label).await?
            }
            AssetRef::Remote { url } => {
                if let Some(public) = asset.public_url() {
                    public.to_string()
                } else if is_absolute_http_url(url) {
                    // Reachable from here but not from the provider.
                    let (bytes, content_type) = resolver.download(url, &label).await?;
                    let content_type = content_type
                        .unwrap_or_else(|| content_type_for(Path::new(url)).to_string());
                    self.upload(bytes, &content_type, "loopback", &label).await?
                } else if url.starts_with('/') {
                    let path = resolver.local.resolve_public_path(url)?;
                    self.hosted_url(&path, url, &label).await?
                } else {
                    return Err(PipelineError::asset_resolution(label, "not a fetchable URL"));
                }
            }
        };

        if !is_absolute_http_url(&url) {
            return Err(PipelineError::asset_resolution(
                label,
                format!("resolved to a non-absolute URL: {}", url),
            ));
        }

        info!(asset = %label, target = %target, url = %url, "Resolved asset");
        Ok(url)
    }

    /// URL for a file under the public asset root.
    async fn hosted_url(&self, path: &Path, public_path: &str, label: &str) -> PipelineResult<String> {
        match &self.resolver.public_base_url {
            Some(base) => Ok(format!("{}{}", base, public_path)),
            None => {
                let bytes = tokio::fs::read(path).await?;
                self.upload(bytes, content_type_for(path), "local", label).await
            }
        }
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        source: &str,
        label: &str,
    ) -> PipelineResult<String> {
        let blob = self
            .resolver
            .blob
            .as_ref()
            .ok_or_else(|| PipelineError::asset_resolution(label, "no blob store configured"))?;

        let kind = MediaKind::from_mime(content_type).unwrap_or(MediaKind::Image);
        let key = object_key(kind, kind.extension_for_mime(content_type));
        let url = blob
            .put(&key, bytes, content_type)
            .await
            .map_err(|e| PipelineError::asset_resolution(label, e.to_string()))?;

        self.uploads.fetch_add(1, Ordering::SeqCst);
        metrics::record_upload(source);
        debug!(store = %blob.name(), key = %key, "Uploaded asset");
        Ok(url)
    }

    /// Produce a local file for `asset`, downloading it if needed.
    pub async fn localize(&self, asset: &AssetRef, kind: MediaKind) -> PipelineResult<PathBuf> {
        let resolver = &self.resolver;
        let label = asset.describe();

        let (bytes, content_type) = match asset {
            AssetRef::Local { path, .. } => return Ok(path.clone()),
            AssetRef::Remote { url } if url.starts_with('/') => {
                return Ok(resolver.local.resolve_public_path(url)?);
            }
            AssetRef::Inline { bytes, mime_type } => (bytes.clone(), Some(mime_type.clone())),
            AssetRef::Remote { url } => {
                if !is_absolute_http_url(url) {
                    return Err(PipelineError::asset_resolution(label, "not a fetchable URL"));
                }
                let (bytes, content_type) = resolver.download(url, &label).await?;
                (bytes, content_type.or_else(|| Some(content_type_for(Path::new(url)).to_string())))
            }
            AssetRef::ProviderHandle { provider, file_id } => {
                let url = resolver.lookup(provider, file_id, &label).await?;
                resolver.download(&url, &label).await?
            }
        };

        if bytes.is_empty() {
            return Err(PipelineError::EmptyAsset(label));
        }

        let extension = content_type
            .as_deref()
            .map(|ct| kind.extension_for_mime(ct))
            .unwrap_or_else(|| kind.default_extension());
        let stored = resolver.local.persist(&bytes, kind, extension).await?;
        match stored {
            AssetRef::Local { path, .. } => Ok(path),
            other => Err(PipelineError::asset_resolution(other.describe(), "store returned a non-local asset")),
        }
    }
}

/// Identity of a reference for memoization.
fn cache_key(asset: &AssetRef) -> String {
    match asset {
        AssetRef::Inline { bytes, .. } => format!("inline:{:x}", Sha256::digest(bytes)),
        AssetRef::Remote { url } => format!("remote:{}", url),
        AssetRef::ProviderHandle { provider, file_id } => format!("handle:{}:{}", provider, file_id),
        AssetRef::Local { public_path, .. } => format!("local:{}", public_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelgen_providers::ProviderResult;
    use reelgen_storage::StorageResult;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CountingBlob {
        puts: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for CountingBlob {
        fn name(&self) -> &str {
            "memory"
        }

        async fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> StorageResult<String> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            // Slow enough for concurrent callers to overlap.
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(format!("https://blob.example.com/{}", key))
        }
    }

    struct StaticLookup(&'static str);

    #[async_trait]
    impl FileLookup for StaticLookup {
        fn provider(&self) -> &str {
            "fal"
        }

        async fn lookup(&self, file_id: &str) -> ProviderResult<String> {
            Ok(format!("{}{}", self.0, file_id))
        }
    }

    fn resolver(dir: &TempDir, blob: Arc<CountingBlob>) -> Arc<AssetResolver> {
        Arc::new(
            AssetResolver::new(LocalAssetStore::new(dir.path(), "/assets"))
                .with_blob_store(blob)
                .with_lookup(Arc::new(StaticLookup("https://files.example.com/"))),
        )
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let blob = Arc::new(CountingBlob::default());
        let run = resolver(&dir, blob.clone()).for_run();

        let asset = AssetRef::inline(b"png-bytes".to_vec(), "image/png");
        let first = run.resolve(&asset, "video").await.unwrap();
        let second = run.resolve(&asset, "video").await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("https://blob.example.com/reelgen/images/"));
        assert!(first.ends_with(".png"));
        assert_eq!(blob.puts.load(Ordering::SeqCst), 1);
        assert_eq!(run.uploads(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_shares_one_upload() {
        let dir = TempDir::new().unwrap();
        let blob = Arc::new(CountingBlob::default());
        let run = resolver(&dir, blob.clone()).for_run();

        let asset = AssetRef::inline(b"voice".to_vec(), "audio/mpeg");
        let (a, b, c) = tokio::join!(
            run.resolve(&asset, "video"),
            run.resolve(&asset, "video"),
            run.resolve(&asset, "video")
        );
        assert_eq!(a.unwrap(), b.as_ref().unwrap().clone());
        assert_eq!(b.unwrap(), c.unwrap());
        assert_eq!(blob.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_upload() {
        let dir = TempDir::new().unwrap();
        let blob = Arc::new(CountingBlob::default());
        let run = resolver(&dir, blob.clone()).for_run();

        let asset = AssetRef::inline(b"voice".to_vec(), "audio/mpeg");
        run.resolve(&asset, "video").await.unwrap();
        run.invalidate(&asset);
        run.resolve(&asset, "video").await.unwrap();
        assert_eq!(blob.puts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_public_remote_passes_through() {
        let dir = TempDir::new().unwrap();
        let blob = Arc::new(CountingBlob::default());
        let run = resolver(&dir, blob.clone()).for_run();

        let url = run
            .resolve(&AssetRef::remote("https://cdn.example.com/a.png"), "video")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/a.png");
        assert_eq!(run.uploads(), 0);
    }

    #[tokio::test]
    async fn test_provider_handle_uses_lookup() {
        let dir = TempDir::new().unwrap();
        let run = resolver(&dir, Arc::new(CountingBlob::default())).for_run();

        let url = run
            .resolve(&AssetRef::provider_handle("fal", "file_9"), "video")
            .await
            .unwrap();
        assert_eq!(url, "https://files.example.com/file_9");

        let err = run
            .resolve(&AssetRef::provider_handle("unknown", "x"), "video")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AssetResolution { .. }));
    }

    #[tokio::test]
    async fn test_non_absolute_lookup_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let run = Arc::new(
            AssetResolver::new(LocalAssetStore::new(dir.path(), "/assets"))
                .with_lookup(Arc::new(StaticLookup("files/"))),
        )
        .for_run();

        let err = run
            .resolve(&AssetRef::provider_handle("fal", "file_9"), "video")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("non-absolute"));
    }

    #[tokio::test]
    async fn test_local_asset_uploaded_without_public_origin() {
        let dir = TempDir::new().unwrap();
        let blob = Arc::new(CountingBlob::default());
        let resolver = resolver(&dir, blob.clone());
        let asset = resolver
            .local_store()
            .persist(b"mp3", MediaKind::Audio, "mp3")
            .await
            .unwrap();

        let url = resolver.for_run().resolve(&asset, "video").await.unwrap();
        assert!(url.starts_with("https://blob.example.com/reelgen/audio/"));
        assert_eq!(blob.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_asset_with_public_origin_and_same_origin() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(
            AssetResolver::new(LocalAssetStore::new(dir.path(), "/assets"))
                .with_public_base_url("https://reelgen.example.com/")
                .with_same_origin_provider("internal"),
        );
        let asset = AssetRef::local(dir.path().join("audio/a.mp3"), "/assets/audio/a.mp3");
        let run = resolver.for_run();

        assert_eq!(
            run.resolve(&asset, "video").await.unwrap(),
            "https://reelgen.example.com/assets/audio/a.mp3"
        );
        assert_eq!(
            run.resolve(&asset, "internal").await.unwrap(),
            "/assets/audio/a.mp3"
        );
    }

    #[tokio::test]
    async fn test_loopback_base_url_is_ignored() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(
            AssetResolver::new(LocalAssetStore::new(dir.path(), "/assets"))
                .with_public_base_url("http://localhost:8000"),
        );
        let asset = resolver
            .local_store()
            .persist(b"png", MediaKind::Image, "png")
            .await
            .unwrap();

        // No blob store and no reachable origin: resolution must fail.
        let err = resolver.for_run().resolve(&asset, "video").await.unwrap_err();
        assert!(matches!(err, PipelineError::AssetResolution { .. }));
    }

    #[tokio::test]
    async fn test_loopback_remote_is_rehosted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/images/a.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let blob = Arc::new(CountingBlob::default());
        let run = resolver(&dir, blob.clone()).for_run();

        // MockServer listens on 127.0.0.1.
        let asset = AssetRef::remote(format!("{}/assets/images/a.png", server.uri()));
        let url = run.resolve(&asset, "video").await.unwrap();
        assert!(url.starts_with("https://blob.example.com/reelgen/images/"));
        assert_eq!(blob.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_localize_downloads_remote_video() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .set_body_bytes(b"mp4".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let run = resolver(&dir, Arc::new(CountingBlob::default())).for_run();
        let path = run
            .localize(&AssetRef::remote(format!("{}/out.mp4", server.uri())), MediaKind::Video)
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("videos")));
        assert_eq!(path.extension().unwrap(), "mp4");
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"mp4");
    }

    #[tokio::test]
    async fn test_localize_separates_empty_from_failed_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty.mp3"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.mp3"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such file"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let run = resolver(&dir, Arc::new(CountingBlob::default())).for_run();

        let err = run
            .localize(&AssetRef::remote(format!("{}/empty.mp3", server.uri())), MediaKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAsset(_)));

        let err = run
            .localize(&AssetRef::remote(format!("{}/gone.mp3", server.uri())), MediaKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AssetResolution { .. }));
        assert!(err.to_string().contains("no such file"));
    }
}
