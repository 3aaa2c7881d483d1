//! Worker setup shared by the offline commands
//!
//! Each invocation rebuilds the worker over the on-disk cache and resumes
//! it from the saved registration.

use crate::config::{Config, ConfigManager};
use crate::error::PostroomResult;
use crate::offline::{
    CacheController, CacheStorage, DiskCacheStorage, HttpNetwork, OfflineSettings, Registration,
    ServiceWorker,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct WorkerHost {
    pub dir: PathBuf,
    pub worker: ServiceWorker,
    pub network: Arc<HttpNetwork>,
    pub registration: Option<Registration>,
}

impl WorkerHost {
    pub async fn open(config: &Config) -> PostroomResult<Self> {
        let settings = OfflineSettings::from_config(config)?;
        let dir = ConfigManager::storage_dir(config);
        debug!("Offline storage at {}", dir.display());

        let storage = Arc::new(DiskCacheStorage::new(&dir));
        let network = Arc::new(HttpNetwork::new(settings.request_timeout));
        let controller = Arc::new(CacheController::new(settings, storage, network.clone()));

        let registration = Registration::load(&dir).await?;
        let worker = match &registration {
            Some(reg) if reg.matches(&controller.settings().partitions) => {
                ServiceWorker::restore(controller, reg.worker_id, reg.state)
            }
            Some(reg) => {
                info!(
                    "Registered worker {} owns {}/{}; a new version will install",
                    reg.worker_id, reg.shell_partition, reg.data_partition
                );
                ServiceWorker::new(controller)
            }
            None => ServiceWorker::new(controller),
        };

        Ok(Self {
            dir,
            worker,
            network,
            registration,
        })
    }

    pub fn storage(&self) -> Arc<dyn CacheStorage> {
        self.worker.controller().storage()
    }

    /// Save the worker's current state as the registration
    pub async fn persist(&mut self) -> PostroomResult<()> {
        let registration = match self.registration.take() {
            Some(mut reg) if reg.worker_id == self.worker.id() => {
                reg.record(self.worker.state());
                reg
            }
            _ => Registration::from_worker(&self.worker),
        };
        registration.save(&self.dir).await?;
        self.registration = Some(registration);
        Ok(())
    }
}
