//! Named cache partitions
//!
//! A partition maps request keys to the most recently stored response.
//! Partitions spring into existence on first write and are removed whole.

use crate::error::PostroomResult;
use crate::offline::request::{RequestKey, Response};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Storage backend for cache partitions
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of existing partitions
    async fn partitions(&self) -> PostroomResult<Vec<String>>;

    /// Delete a partition and everything in it; false if it didn't exist
    async fn delete_partition(&self, partition: &str) -> PostroomResult<bool>;

    /// Stored response for `key`, marked as coming from cache
    async fn get(&self, partition: &str, key: &RequestKey) -> PostroomResult<Option<Response>>;

    /// Store `response` under `key`, replacing any previous entry
    async fn put(&self, partition: &str, key: &RequestKey, response: &Response)
        -> PostroomResult<()>;

    /// Remove the entry for `key`; false if there was none
    async fn delete(&self, partition: &str, key: &RequestKey) -> PostroomResult<bool>;

    /// Number of entries in a partition (0 if absent)
    async fn len(&self, partition: &str) -> PostroomResult<usize>;
}

/// Process-local partitions
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    partitions: RwLock<BTreeMap<String, HashMap<RequestKey, Response>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn partitions(&self) -> PostroomResult<Vec<String>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.keys().cloned().collect())
    }

    async fn delete_partition(&self, partition: &str) -> PostroomResult<bool> {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.remove(partition).is_some())
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> PostroomResult<Option<Response>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions
            .get(partition)
            .and_then(|entries| entries.get(key))
            .map(|response| response.clone().into_cached()))
    }

    async fn put(
        &self,
        partition: &str,
        key: &RequestKey,
        response: &Response,
    ) -> PostroomResult<()> {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &RequestKey) -> PostroomResult<bool> {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions
            .get_mut(partition)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn len(&self, partition: &str) -> PostroomResult<usize> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.get(partition).map_or(0, HashMap::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::request::{Request, ResponseSource};

    fn key(url: &str) -> RequestKey {
        Request::get(url).unwrap().cache_key().unwrap()
    }

    #[tokio::test]
    async fn partitions_created_on_write() {
        let storage = MemoryCacheStorage::new();
        assert!(storage.partitions().await.unwrap().is_empty());

        storage
            .put("admin-shell-v1", &key("http://localhost:8080/"), &Response::new(200, "<html>"))
            .await
            .unwrap();

        assert_eq!(storage.partitions().await.unwrap(), vec!["admin-shell-v1"]);
        assert_eq!(storage.len("admin-shell-v1").await.unwrap(), 1);
        assert_eq!(storage.len("admin-data-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let storage = MemoryCacheStorage::new();
        let k = key("http://localhost:3000/api/folders");
        storage.put("data", &k, &Response::new(200, "old")).await.unwrap();
        storage.put("data", &k, &Response::new(200, "new")).await.unwrap();

        let cached = storage.get("data", &k).await.unwrap().unwrap();
        assert_eq!(cached.body, b"new");
        assert_eq!(cached.source, ResponseSource::Cache);
        assert_eq!(storage.len("data").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_partition() {
        let storage = MemoryCacheStorage::new();
        let k = key("http://localhost:8080/js/app-init.js");
        storage.put("shell-v1", &k, &Response::new(200, "js")).await.unwrap();

        assert!(storage.delete_partition("shell-v1").await.unwrap());
        assert!(!storage.delete_partition("shell-v1").await.unwrap());
        assert!(storage.get("shell-v1", &k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_single_entry() {
        let storage = MemoryCacheStorage::new();
        let kept = key("http://localhost:8080/css/admin.css");
        let removed = key("http://localhost:8080/js/app-init.js");
        storage.put("shell-v1", &kept, &Response::new(200, "css")).await.unwrap();
        storage.put("shell-v1", &removed, &Response::new(200, "js")).await.unwrap();

        assert!(storage.delete("shell-v1", &removed).await.unwrap());
        assert!(!storage.delete("shell-v1", &removed).await.unwrap());
        assert!(!storage.delete("missing", &removed).await.unwrap());
        assert_eq!(storage.len("shell-v1").await.unwrap(), 1);
        assert!(storage.get("shell-v1", &kept).await.unwrap().is_some());
    }
}
