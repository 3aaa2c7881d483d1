//! Offline support for the admin mail pages
//!
//! A [`ServiceWorker`] owns a [`CacheController`] that sits between the page
//! and the network. On install it precaches the application shell; on
//! activation it drops partitions left behind by older versions; once
//! activated it answers intercepted requests from the network or the cache
//! depending on their [`Route`].

pub mod controller;
pub mod disk;
pub mod network;
pub mod registration;
pub mod request;
pub mod settings;
pub mod storage;
pub mod worker;

pub use controller::{CacheController, FetchOutcome, Route};
pub use disk::DiskCacheStorage;
pub use network::{HttpNetwork, Network};
pub use registration::Registration;
pub use request::{Method, Request, RequestKey, RequestMode, Response, ResponseSource};
pub use settings::{OfflineSettings, PartitionNames};
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use worker::{ControlMessage, ServiceWorker, WorkerHandle, WorkerState};
