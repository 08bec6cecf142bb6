//! In-memory artifact store for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{ArtifactStore, StorageError};

/// Objects live in a `HashMap` behind a [`RwLock`]. Writes can be made to
/// fail on demand, and every successful `put` is counted. Each signed URL
/// is unique.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<HashMap<String, (String, Bytes)>>,
    puts: AtomicUsize,
    signatures: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().await.get(key).map(|(ct, _)| ct.clone())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.objects
            .write()
            .await
            .insert(key.to_string(), (content_type.to_string(), Bytes::from(body)));
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StorageError::NotFound { key: key.to_string() })
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let n = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!("memory://{key}?expires_in={}&sig={n}", ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryArtifactStore::new();
        store.put("u/e.json", b"{}".to_vec(), "application/json").await.unwrap();
        assert_eq!(store.get("u/e.json").await.unwrap(), &b"{}"[..]);
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.content_type("u/e.json").await.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = MemoryArtifactStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryArtifactStore::new();
        store.fail_writes(true);
        assert!(store.put("k", vec![1], "application/pdf").await.is_err());
        assert_eq!(store.put_count(), 0);
    }
}
