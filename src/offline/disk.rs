//! Disk-backed cache partitions
//!
//! Layout under the storage root:
//!
//! ```text
//! {root}/partitions/{partition}/{sha256(method url)}.entry
//! ```
//!
//! An entry file is one line of JSON metadata followed by the raw body.
//! Entries are written to a temp file and renamed into place, so readers
//! never observe a partial write and concurrent writers settle on the last
//! rename.

use crate::error::{PostroomError, PostroomResult};
use crate::offline::request::{RequestKey, Response, ResponseSource};
use crate::offline::storage::CacheStorage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

const ENTRY_EXT: &str = "entry";

/// Metadata line of an entry file
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
}

/// Cache partitions stored as directories of entry files
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Use `root` as the storage directory; created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn partitions_dir(&self) -> PathBuf {
        self.root.join("partitions")
    }

    fn partition_dir(&self, partition: &str) -> PostroomResult<PathBuf> {
        validate_partition_name(partition)?;
        Ok(self.partitions_dir().join(partition))
    }

    fn entry_path(&self, partition: &str, key: &RequestKey) -> PostroomResult<PathBuf> {
        Ok(self
            .partition_dir(partition)?
            .join(format!("{}.{}", key.digest(), ENTRY_EXT)))
    }

    async fn read_entry(path: &Path) -> PostroomResult<Option<Response>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PostroomError::io(
                    format!("reading cache entry {}", path.display()),
                    e,
                ))
            }
        };

        let Some(split) = bytes.iter().position(|b| *b == b'\n') else {
            return Err(PostroomError::CacheStorage(format!(
                "corrupt cache entry {}",
                path.display()
            )));
        };
        let meta: EntryMeta = serde_json::from_slice(&bytes[..split])?;

        Ok(Some(Response {
            status: meta.status,
            headers: meta.headers,
            body: bytes[split + 1..].to_vec(),
            source: ResponseSource::Cache,
        }))
    }
}

/// Validate that a partition name is safe to use as a directory name
pub fn validate_partition_name(name: &str) -> PostroomResult<()> {
    if name.is_empty() {
        return Err(PostroomError::CacheStorage(
            "Partition name cannot be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        || name.starts_with('.')
    {
        return Err(PostroomError::CacheStorage(format!(
            "Invalid partition name '{}': must contain only alphanumeric characters, hyphens, underscores or dots",
            name
        )));
    }
    Ok(())
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn partitions(&self) -> PostroomResult<Vec<String>> {
        let dir = self.partitions_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(PostroomError::io("reading partitions directory", e)),
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PostroomError::io("reading partition entry", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PostroomError::io("reading partition entry type", e))?;
            if !file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete_partition(&self, partition: &str) -> PostroomResult<bool> {
        let dir = self.partition_dir(partition)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Deleted partition {}", partition);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PostroomError::io(
                format!("deleting partition {}", dir.display()),
                e,
            )),
        }
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> PostroomResult<Option<Response>> {
        let path = self.entry_path(partition, key)?;
        Self::read_entry(&path).await
    }

    async fn put(
        &self,
        partition: &str,
        key: &RequestKey,
        response: &Response,
    ) -> PostroomResult<()> {
        let dir = self.partition_dir(partition)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PostroomError::io(format!("creating partition {}", dir.display()), e))?;

        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: Utc::now(),
        };
        let mut content = serde_json::to_vec(&meta)?;
        content.push(b'\n');
        content.extend_from_slice(&response.body);

        let path = self.entry_path(partition, key)?;
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &content)
            .await
            .map_err(|e| PostroomError::io(format!("writing cache entry {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                warn!("Failed to remove temp entry {}: {}", tmp.display(), cleanup);
            }
            return Err(PostroomError::io(
                format!("storing cache entry {}", path.display()),
                e,
            ));
        }

        debug!("Stored {} in {}", key, partition);
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &RequestKey) -> PostroomResult<bool> {
        let path = self.entry_path(partition, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PostroomError::io(
                format!("deleting cache entry {}", path.display()),
                e,
            )),
        }
    }

    async fn len(&self, partition: &str) -> PostroomResult<usize> {
        let dir = self.partition_dir(partition)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(PostroomError::io("reading partition", e)),
        };

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PostroomError::io("reading partition entry", e))?
        {
            if entry
                .path()
                .extension()
                .is_some_and(|ext| ext == ENTRY_EXT)
            {
                count += 1;
            }
        }
        Ok(count)
    }
}
