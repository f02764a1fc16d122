//! Asset storage for the reelgen pipeline.
//!
//! This crate provides:
//! - An S3-compatible (Cloudflare R2) blob store used to rehost assets
//!   so external providers can fetch them
//! - The [`BlobStore`] trait the asset resolver uploads through
//! - A local, publicly served asset directory with UUID-named files

pub mod blob;
pub mod client;
pub mod error;
pub mod local;

pub use blob::{object_key, BlobStore};
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use local::{LocalAsset, LocalAssetStore};
