//! Normalized references to binary artifacts.
//!
//! Every provider output is converted into an [`AssetRef`] at the adapter
//! boundary so nothing downstream has to guess the shape of a provider
//! payload.

use std::net::IpAddr;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// Broad media category of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Default file extension for persisted assets of this kind.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }

    /// Default content type for uploads of this kind.
    pub fn default_content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    /// Directory name under the public asset root.
    pub fn directory(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audio",
            MediaKind::Video => "videos",
        }
    }

    /// Guess the kind from a MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top = mime.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// File extension for a MIME type, falling back to the kind default.
    pub fn extension_for_mime(&self, mime: &str) -> &'static str {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/png" => "png",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/ogg" => "ogg",
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => self.default_extension(),
        }
    }
}

/// A reference to an image, audio or video artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetRef {
    /// Bytes returned directly by a provider.
    Inline { bytes: Vec<u8>, mime_type: String },
    /// A URL that may or may not be reachable from outside this host.
    Remote { url: String },
    /// A provider-internal file identifier.
    ProviderHandle { provider: String, file_id: String },
    /// A file written under the public asset root.
    Local { path: PathBuf, public_path: String },
}

impl AssetRef {
    pub fn remote(url: impl Into<String>) -> Self {
        AssetRef::Remote { url: url.into() }
    }

    pub fn inline(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        AssetRef::Inline {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn provider_handle(provider: impl Into<String>, file_id: impl Into<String>) -> Self {
        AssetRef::ProviderHandle {
            provider: provider.into(),
            file_id: file_id.into(),
        }
    }

    pub fn local(path: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        AssetRef::Local {
            path: path.into(),
            public_path: public_path.into(),
        }
    }

    /// Short label for logs (never includes payload bytes).
    pub fn describe(&self) -> String {
        match self {
            AssetRef::Inline { bytes, mime_type } => {
                format!("inline({} bytes, {})", bytes.len(), mime_type)
            }
            AssetRef::Remote { url } => format!("remote({})", url),
            AssetRef::ProviderHandle { provider, file_id } => {
                format!("handle({}:{})", provider, file_id)
            }
            AssetRef::Local { public_path, .. } => format!("local({})", public_path),
        }
    }

    /// Returns the URL if this is already a publicly fetchable reference.
    pub fn public_url(&self) -> Option<&str> {
        match self {
            AssetRef::Remote { url } if is_absolute_http_url(url) && !is_loopback_url(url) => {
                Some(url)
            }
            _ => None,
        }
    }
}

/// True for absolute `http`/`https` URLs with a host.
pub fn is_absolute_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

/// True when the URL points at this machine or a name only resolvable locally.
pub fn is_loopback_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost"
                || domain.ends_with(".localhost")
                || domain.ends_with(".local")
                || domain.ends_with(".internal")
                || !domain.contains('.')
        }
        Some(Host::Ipv4(ip)) => is_local_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_local_ip(IpAddr::V6(ip)),
        None => false,
    }
}

fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_unspecified() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
