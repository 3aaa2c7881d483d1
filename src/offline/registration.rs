//! Persisted worker registration
//!
//! The CLI runs one command per process, so the worker's lifecycle state is
//! kept in `registration.json` under the storage directory.

use crate::error::{PostroomError, PostroomResult};
use crate::offline::settings::PartitionNames;
use crate::offline::worker::{ServiceWorker, WorkerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const REGISTRATION_FILE: &str = "registration.json";

/// Registration record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    /// Worker that owns the registration
    pub worker_id: Uuid,

    pub state: WorkerState,

    /// Partitions owned by the registered worker version
    pub shell_partition: String,
    pub data_partition: String,

    pub installed_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Snapshot a worker's current state
    pub fn from_worker(worker: &ServiceWorker) -> Self {
        let partitions = &worker.controller().settings().partitions;
        let mut registration = Self {
            worker_id: worker.id(),
            state: WorkerState::Parsed,
            shell_partition: partitions.shell.clone(),
            data_partition: partitions.data.clone(),
            installed_at: None,
            activated_at: None,
            updated_at: Utc::now(),
        };
        registration.record(worker.state());
        registration
    }

    /// Record a state transition, stamping install and activation times
    pub fn record(&mut self, state: WorkerState) {
        let now = Utc::now();
        match state {
            WorkerState::Installed if self.installed_at.is_none() => {
                self.installed_at = Some(now);
            }
            WorkerState::Activated => {
                self.installed_at.get_or_insert(now);
                self.activated_at.get_or_insert(now);
            }
            _ => {}
        }
        self.state = state;
        self.updated_at = now;
    }

    /// Whether the registration belongs to the configured worker version
    pub fn matches(&self, partitions: &PartitionNames) -> bool {
        self.shell_partition == partitions.shell && self.data_partition == partitions.data
    }

    /// Registration file path under a storage directory
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(REGISTRATION_FILE)
    }

    /// Load the registration, if one was saved
    pub async fn load(dir: &Path) -> PostroomResult<Option<Self>> {
        let path = Self::file_path(dir);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            PostroomError::io(format!("reading registration {}", path.display()), e)
        })?;

        let registration: Registration = serde_json::from_str(&content)?;
        Ok(Some(registration))
    }

    pub async fn save(&self, dir: &Path) -> PostroomResult<()> {
        let path = Self::file_path(dir);

        fs::create_dir_all(dir)
            .await
            .map_err(|e| PostroomError::io("creating storage directory", e))?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).await.map_err(|e| {
            PostroomError::io(format!("writing registration {}", path.display()), e)
        })?;

        Ok(())
    }

    /// Remove the registration file; returns whether one existed
    pub async fn delete(dir: &Path) -> PostroomResult<bool> {
        let path = Self::file_path(dir);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await.map_err(|e| {
            PostroomError::io(format!("deleting registration {}", path.display()), e)
        })?;
        Ok(true)
    }
}
