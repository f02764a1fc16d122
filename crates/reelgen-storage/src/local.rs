//! Publicly served local asset directory.
//!
//! Intermediate and final artifacts are written under
//! `<root>/<images|audio|videos>/<uuid>.<ext>` and served by the API under
//! `<public_prefix>/...`. UUID filenames keep concurrent runs from
//! colliding without any locking.

use std::path::{Component, Path, PathBuf};

use reelgen_models::{AssetRef, MediaKind};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// A freshly allocated location under the asset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    /// Absolute filesystem path
    pub path: PathBuf,
    /// Path as served over HTTP (e.g. `/assets/videos/<uuid>.mp4`)
    pub public_path: String,
}

impl LocalAsset {
    pub fn into_asset_ref(self) -> AssetRef {
        AssetRef::local(self.path, self.public_path)
    }
}

/// Writes UUID-named files under a public-servable root.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        let prefix = public_prefix.into();
        let prefix = format!("/{}", prefix.trim_matches('/'));
        Self {
            root: root.into(),
            public_prefix: prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Create the per-kind directories.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for kind in [MediaKind::Image, MediaKind::Audio, MediaKind::Video] {
            fs::create_dir_all(self.root.join(kind.directory())).await?;
        }
        Ok(())
    }

    /// Reserve a new UUID-named path without writing anything.
    pub async fn allocate(&self, kind: MediaKind, extension: &str) -> StorageResult<LocalAsset> {
        let dir = self.root.join(kind.directory());
        fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension.trim_start_matches('.'));
        Ok(LocalAsset {
            path: dir.join(&file_name),
            public_path: format!("{}/{}/{}", self.public_prefix, kind.directory(), file_name),
        })
    }

    /// Write `bytes` to a new UUID-named file and return its reference.
    pub async fn persist(
        &self,
        bytes: &[u8],
        kind: MediaKind,
        extension: &str,
    ) -> StorageResult<AssetRef> {
        let asset = self.allocate(kind, extension).await?;
        fs::write(&asset.path, bytes).await?;
        debug!(
            path = %asset.path.display(),
            size = bytes.len(),
            "Persisted asset"
        );
        Ok(asset.into_asset_ref())
    }

    /// Map a public path back to a file under the root.
    ///
    /// Paths outside the prefix or containing `..` are rejected.
    pub fn resolve_public_path(&self, public_path: &str) -> StorageResult<PathBuf> {
        let relative = public_path
            .strip_prefix(&self.public_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::invalid_path(public_path))?;

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::invalid_path(public_path));
        }

        Ok(self.root.join(relative))
    }

    /// Read an asset previously written by this store.
    pub async fn read(&self, public_path: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve_public_path(public_path)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(public_path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check that the root accepts writes (readiness probe).
    pub async fn check_writable(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        let probe = self.root.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}
