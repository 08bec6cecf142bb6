//! Artifact store boundary: manuscript JSON and rendered documents, plus
//! time-limited retrieval URLs.
//!
//! Keys are flat strings. Writers never overwrite a document key; versioned
//! names are chosen by the caller.

#[cfg(test)]
pub mod memory;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use self::s3::S3ArtifactStore;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{key}' does not exist")]
    NotFound { key: String },

    #[error("reading '{key}' failed: {message}")]
    Read { key: String, message: String },

    #[error("writing '{key}' failed: {message}")]
    Write { key: String, message: String },

    #[error("signing a URL for '{key}' failed: {message}")]
    Sign { key: String, message: String },
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Retrieval URL for `key`, valid for `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}
