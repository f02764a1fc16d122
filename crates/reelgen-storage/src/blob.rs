//! Provider-neutral blob store abstraction.

use async_trait::async_trait;
use reelgen_models::MediaKind;
use uuid::Uuid;

use crate::error::StorageResult;

/// Object store that turns bytes into a URL external providers can fetch.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    /// Store `bytes` under `key` and return an absolute, publicly fetchable URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String>;
}

/// UUID-named object key for a rehosted asset, e.g. `reelgen/audio/<uuid>.mp3`.
pub fn object_key(kind: MediaKind, extension: &str) -> String {
    format!(
        "reelgen/{}/{}.{}",
        kind.directory(),
        Uuid::new_v4(),
        extension.trim_start_matches('.')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys_are_unique() {
        let a = object_key(MediaKind::Audio, "mp3");
        let b = object_key(MediaKind::Audio, ".mp3");
        assert!(a.starts_with("reelgen/audio/"));
        assert!(a.ends_with(".mp3"));
        assert!(!b.contains(".."));
        assert_ne!(a, b);
    }
}
