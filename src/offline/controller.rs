//! Offline cache controller
//!
//! Classifies intercepted requests and applies a caching strategy per class:
//!
//! | Route | Strategy | Partition |
//! |-------|----------|-----------|
//! | Api | network-first, cache fallback | data |
//! | Navigation | network-first, offline page fallback | any |
//! | Static | cache-first, network fill | shell |
//! | Passthrough | untouched | - |

use crate::error::{PostroomError, PostroomResult};
use crate::offline::network::Network;
use crate::offline::request::{Method, Request, RequestKey, Response};
use crate::offline::settings::{authority, OfflineSettings};
use crate::offline::storage::CacheStorage;
use futures_util::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// How a request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Api,
    Navigation,
    Static,
    Passthrough,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Navigation => write!(f, "navigation"),
            Self::Static => write!(f, "static"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Result of intercepting a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The controller produced this response
    Respond(Response),
    /// Not handled; the page's request goes to the network as usual
    Passthrough,
}

/// Applies caching strategies on top of a storage backend and the network
pub struct CacheController {
    settings: OfflineSettings,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl CacheController {
    pub fn new(
        settings: OfflineSettings,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            settings,
            storage,
            network,
        }
    }

    pub fn settings(&self) -> &OfflineSettings {
        &self.settings
    }

    pub fn storage(&self) -> Arc<dyn CacheStorage> {
        self.storage.clone()
    }

    /// Precache the shell manifest.
    ///
    /// All assets are fetched before anything is stored; if any fetch fails
    /// or returns a non-2xx status nothing is written. If a store fails the
    /// entries written so far are put back to what they were before. Returns
    /// the number of assets stored.
    pub async fn precache(&self) -> PostroomResult<usize> {
        let fetches = self.settings.shell_assets.iter().map(|url| async move {
            let request = Request::get(url.as_str())?;
            let response = self.network.fetch(&request).await?;
            if !response.is_ok() {
                return Err(PostroomError::network(
                    url.as_str(),
                    format!("status {}", response.status),
                ));
            }
            Ok::<_, PostroomError>((RequestKey::get(url), response))
        });
        let assets = try_join_all(fetches).await?;

        let shell = &self.settings.partitions.shell;
        let mut written = Vec::with_capacity(assets.len());
        for (key, response) in &assets {
            let stored = match self.storage.get(shell, key).await {
                Ok(previous) => self.storage.put(shell, key, response).await.map(|()| previous),
                Err(e) => Err(e),
            };
            match stored {
                Ok(previous) => written.push((key, previous)),
                Err(e) => {
                    self.roll_back(shell, written).await;
                    return Err(e);
                }
            }
        }
        Ok(assets.len())
    }

    /// Restore entries overwritten by a failed precache, newest first
    async fn roll_back(&self, partition: &str, written: Vec<(&RequestKey, Option<Response>)>) {
        for (key, previous) in written.into_iter().rev() {
            let restored = match previous {
                Some(response) => self.storage.put(partition, key, &response).await,
                None => self.storage.delete(partition, key).await.map(|_| ()),
            };
            if let Err(e) = restored {
                warn!(partition, key = %key, error = %e, "Failed to roll back precached entry");
            }
        }
    }

    /// Install step: precache the shell, swallowing failures
    pub async fn install(&self) -> bool {
        match self.precache().await {
            Ok(count) => {
                info!(
                    partition = self.settings.partitions.shell.as_str(),
                    assets = count,
                    "Shell precached"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Shell precache failed, assets stay uncached");
                false
            }
        }
    }

    /// Delete every partition that doesn't belong to the current version.
    /// A partition that can't be deleted is logged and skipped. Returns the
    /// deleted names.
    pub async fn activate(&self) -> PostroomResult<Vec<String>> {
        let mut deleted = vec![];
        for name in self.storage.partitions().await? {
            if self.settings.partitions.is_current(&name) {
                continue;
            }
            match self.storage.delete_partition(&name).await {
                Ok(true) => {
                    info!("Deleted stale partition {}", name);
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(partition = name.as_str(), error = %e, "Failed to delete stale partition");
                }
            }
        }
        Ok(deleted)
    }

    /// Classify a request
    pub fn route(&self, request: &Request) -> Route {
        if request.method != Method::Get {
            return Route::Passthrough;
        }

        let target = authority(&request.url);
        if target.is_some() && target == self.settings.api_authority() {
            return Route::Api;
        }

        if request.is_navigation() {
            return Route::Navigation;
        }

        if request.url.origin() == self.settings.origin.origin() && self.is_static_asset(&request.url)
        {
            return Route::Static;
        }

        Route::Passthrough
    }

    fn is_static_asset(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();
        self.settings
            .static_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Handle an intercepted request
    pub async fn handle_fetch(&self, request: &Request) -> PostroomResult<FetchOutcome> {
        let route = self.route(request);
        debug!(route = %route, url = %request.url, "Intercepted request");

        let response = match route {
            Route::Passthrough => return Ok(FetchOutcome::Passthrough),
            Route::Api => self.network_first(request).await?,
            Route::Navigation => self.navigate(request).await?,
            Route::Static => self.cache_first(request).await?,
        };
        Ok(FetchOutcome::Respond(response))
    }

    async fn network_first(&self, request: &Request) -> PostroomResult<Response> {
        let key = RequestKey::get(&request.url);
        let data = &self.settings.partitions.data;

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(data, &key, &response).await;
                }
                Ok(response)
            }
            Err(e) => {
                debug!("API request failed, trying cache: {}", e);
                self.lookup(data, &key)
                    .await
                    .ok_or_else(|| PostroomError::OfflineMiss(request.url.to_string()))
            }
        }
    }

    async fn navigate(&self, request: &Request) -> PostroomResult<Response> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!("Navigation failed, serving offline page: {}", e);
                for page in [&self.settings.offline_page, &self.settings.root_page] {
                    if let Some(response) = self.match_any(&RequestKey::get(page)).await {
                        return Ok(response);
                    }
                }
                Err(PostroomError::OfflineMiss(request.url.to_string()))
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> PostroomResult<Response> {
        let key = RequestKey::get(&request.url);
        let shell = &self.settings.partitions.shell;

        if let Some(cached) = self.lookup(shell, &key).await {
            return Ok(cached);
        }

        let response = self.network.fetch(request).await?;
        if response.is_ok() {
            self.store(shell, &key, &response).await;
        }
        Ok(response)
    }

    /// Look up `key` in the shell partition, then the data partition
    async fn match_any(&self, key: &RequestKey) -> Option<Response> {
        let partitions = &self.settings.partitions;
        for partition in [&partitions.shell, &partitions.data] {
            if let Some(response) = self.lookup(partition, key).await {
                return Some(response);
            }
        }
        None
    }

    /// Cache read where storage failures count as a miss
    async fn lookup(&self, partition: &str, key: &RequestKey) -> Option<Response> {
        match self.storage.get(partition, key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(partition, key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Cache write where storage failures are logged and dropped
    async fn store(&self, partition: &str, key: &RequestKey, response: &Response) {
        if let Err(e) = self.storage.put(partition, key, response).await {
            warn!(partition, key = %key, error = %e, "Cache write failed");
        }
    }

    /// Background sync. The folder-refresh tag is reserved and currently
    /// completes without doing any work. Returns whether the tag was handled.
    pub async fn sync(&self, tag: &str) -> bool {
        if tag == self.settings.sync_tag {
            debug!("Sync {} requested, nothing to refresh", tag);
            true
        } else {
            debug!("Ignoring unknown sync tag {}", tag);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use crate::offline::disk::DiskCacheStorage;
    use crate::offline::request::ResponseSource;
    use crate::offline::storage::MemoryCacheStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted network: fixed responses per URL, switchable offline
    #[derive(Default)]
    pub(crate) struct FakeNetwork {
        responses: Mutex<HashMap<String, Response>>,
        offline: AtomicBool,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeNetwork {
        pub(crate) fn serve(&self, url: &str, response: Response) {
            self.responses.lock().unwrap().insert(url.to_string(), response);
        }

        pub(crate) fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &Request) -> PostroomResult<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(PostroomError::network(request.url.as_str(), "offline"));
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| Response::new(404, "not found")))
        }
    }

    pub(crate) fn settings_with_assets(assets: &[&str]) -> OfflineSettings {
        let mut config = Config::default();
        config.cache.shell_assets = assets.iter().map(|a| a.to_string()).collect();
        OfflineSettings::from_config(&config).unwrap()
    }

    fn controller(
        settings: OfflineSettings,
    ) -> (CacheController, Arc<MemoryCacheStorage>, Arc<FakeNetwork>) {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(FakeNetwork::default());
        let controller = CacheController::new(settings, storage.clone(), network.clone());
        (controller, storage, network)
    }

    #[tokio::test]
    async fn routes_requests() {
        let (controller, _, _) = controller(settings_with_assets(&[]));

        let cases = [
            (Request::get("http://localhost:3000/api/folders").unwrap(), Route::Api),
            (Request::navigate("http://localhost:3000/login").unwrap(), Route::Api),
            (Request::navigate("http://localhost:8080/admin/").unwrap(), Route::Navigation),
            (Request::get("http://localhost:8080/js/app-init.js").unwrap(), Route::Static),
            (Request::get("http://localhost:8080/img/LOGO.PNG").unwrap(), Route::Static),
            (Request::get("http://cdn.example.com/lib.js").unwrap(), Route::Passthrough),
            (Request::get("http://localhost:8080/admin/data.json").unwrap(), Route::Passthrough),
            (
                Request::new(Method::Post, "http://localhost:3000/api/send").unwrap(),
                Route::Passthrough,
            ),
        ];
        for (request, expected) in cases {
            assert_eq!(controller.route(&request), expected, "{}", request.url);
        }
    }

    #[tokio::test]
    async fn installed_shell_served_offline() {
        let (controller, storage, network) = controller(settings_with_assets(&["/index.html"]));
        network.serve("http://localhost:8080/index.html", Response::new(200, "<html>shell</html>"));

        assert!(controller.install().await);
        assert_eq!(storage.len("admin-shell-v1").await.unwrap(), 1);

        network.set_offline(true);
        let request = Request::navigate("http://localhost:8080/index.html").unwrap();
        let FetchOutcome::Respond(response) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(response.body, b"<html>shell</html>");
        assert_eq!(response.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn install_is_all_or_nothing() {
        let (controller, storage, network) =
            controller(settings_with_assets(&["/css/admin.css", "/js/missing.js"]));
        network.serve("http://localhost:8080/css/admin.css", Response::new(200, "body{}"));

        assert!(!controller.install().await);
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn static_assets_are_cache_first() {
        let (controller, storage, network) = controller(settings_with_assets(&[]));
        let url = "http://localhost:8080/css/admin.css";
        network.serve(url, Response::new(200, "v1"));
        let request = Request::get(url).unwrap();

        let FetchOutcome::Respond(first) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(storage.len("admin-shell-v1").await.unwrap(), 1);

        network.serve(url, Response::new(200, "v2"));
        let FetchOutcome::Respond(second) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(second.body, b"v1");
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn static_error_status_not_cached() {
        let (controller, storage, _) = controller(settings_with_assets(&[]));
        let request = Request::get("http://localhost:8080/js/gone.js").unwrap();

        let outcome = controller.handle_fetch(&request).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Respond(ref r) if r.status == 404));
        assert_eq!(storage.len("admin-shell-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn api_falls_back_to_stored_body() {
        let (controller, _, network) = controller(settings_with_assets(&[]));
        let url = "http://localhost:3000/api/folders/inbox";
        let body = r#"{"messages":[{"id":7,"subject":"Quarterly é"}]}"#.as_bytes().to_vec();
        network.serve(url, Response::new(200, body.clone()));
        let request = Request::get(url).unwrap();

        let live = controller.handle_fetch(&request).await.unwrap();
        assert!(matches!(live, FetchOutcome::Respond(ref r) if r.source == ResponseSource::Network));

        network.set_offline(true);
        let FetchOutcome::Respond(fallback) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(fallback.body, body);
        assert_eq!(fallback.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn api_prefers_fresh_network() {
        let (controller, _, network) = controller(settings_with_assets(&[]));
        let url = "http://localhost:3000/api/unread";
        let request = Request::get(url).unwrap();

        network.serve(url, Response::new(200, "3"));
        controller.handle_fetch(&request).await.unwrap();
        network.serve(url, Response::new(200, "5"));

        let FetchOutcome::Respond(response) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(response.body, b"5");
    }

    #[tokio::test]
    async fn api_offline_without_copy_fails() {
        let (controller, _, network) = controller(settings_with_assets(&[]));
        network.set_offline(true);
        let request = Request::get("http://localhost:3000/api/folders").unwrap();

        let err = controller.handle_fetch(&request).await.unwrap_err();
        assert!(matches!(err, PostroomError::OfflineMiss(_)));
    }

    #[tokio::test]
    async fn navigation_falls_back_to_admin_then_root() {
        let (controller, storage, network) = controller(settings_with_assets(&[]));
        network.set_offline(true);
        let request = Request::navigate("http://localhost:8080/admin/folders/inbox").unwrap();

        let root = controller.settings().root_page.clone();
        storage
            .put("admin-shell-v1", &RequestKey::get(&root), &Response::new(200, "root"))
            .await
            .unwrap();
        let FetchOutcome::Respond(response) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(response.body, b"root");

        let admin = controller.settings().offline_page.clone();
        storage
            .put("admin-shell-v1", &RequestKey::get(&admin), &Response::new(200, "admin"))
            .await
            .unwrap();
        let FetchOutcome::Respond(response) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(response.body, b"admin");
    }

    #[tokio::test]
    async fn offline_root_navigation_prefers_admin_page() {
        let (controller, storage, network) =
            controller(settings_with_assets(&["/", "/admin/", "/index.html"]));
        network.serve("http://localhost:8080/", Response::new(200, "site root"));
        network.serve("http://localhost:8080/admin/", Response::new(200, "admin"));
        network.serve("http://localhost:8080/index.html", Response::new(200, "index"));
        assert!(controller.install().await);
        assert_eq!(storage.len("admin-shell-v1").await.unwrap(), 3);

        network.set_offline(true);
        let request = Request::navigate("http://localhost:8080/").unwrap();
        let FetchOutcome::Respond(response) = controller.handle_fetch(&request).await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(response.body, b"admin");
    }

    #[tokio::test]
    async fn non_get_passes_through_untouched() {
        let (controller, storage, network) = controller(settings_with_assets(&[]));
        let request = Request::new(Method::Post, "http://localhost:3000/api/send")
            .unwrap()
            .with_header("Content-Type", "application/json");

        let outcome = controller.handle_fetch(&request).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Passthrough);
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activate_deletes_stale_partitions() {
        let mut settings = settings_with_assets(&[]);
        settings.partitions.shell = "shell-v2".to_string();
        settings.partitions.data = "data-v1".to_string();
        let (controller, storage, _) = controller(settings);

        let key = RequestKey::get(&Url::parse("http://localhost:8080/").unwrap());
        storage.put("shell-v1", &key, &Response::new(200, "old")).await.unwrap();
        storage.put("data-v1", &key, &Response::new(200, "data")).await.unwrap();

        let deleted = controller.activate().await.unwrap();
        assert_eq!(deleted, vec!["shell-v1".to_string()]);
        assert_eq!(storage.partitions().await.unwrap(), vec!["data-v1".to_string()]);
    }

    #[tokio::test]
    async fn activate_skips_undeletable_partitions() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(DiskCacheStorage::new(temp.path()));
        let key = RequestKey::get(&Url::parse("http://localhost:8080/").unwrap());
        storage.put("admin-shell-v0", &key, &Response::new(200, "old")).await.unwrap();
        std::fs::create_dir_all(temp.path().join("partitions").join("Old Cache")).unwrap();

        let controller = CacheController::new(
            settings_with_assets(&[]),
            storage.clone(),
            Arc::new(FakeNetwork::default()),
        );

        let deleted = controller.activate().await.unwrap();
        assert_eq!(deleted, vec!["admin-shell-v0".to_string()]);
        assert_eq!(storage.partitions().await.unwrap(), vec!["Old Cache".to_string()]);
    }

    /// Memory storage whose nth write fails
    struct FailingPutStorage {
        inner: MemoryCacheStorage,
        fail_on: usize,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl CacheStorage for FailingPutStorage {
        async fn partitions(&self) -> PostroomResult<Vec<String>> {
            self.inner.partitions().await
        }

        async fn delete_partition(&self, partition: &str) -> PostroomResult<bool> {
            self.inner.delete_partition(partition).await
        }

        async fn get(&self, partition: &str, key: &RequestKey) -> PostroomResult<Option<Response>> {
            self.inner.get(partition, key).await
        }

        async fn put(
            &self,
            partition: &str,
            key: &RequestKey,
            response: &Response,
        ) -> PostroomResult<()> {
            if self.puts.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(PostroomError::CacheStorage("disk full".to_string()));
            }
            self.inner.put(partition, key, response).await
        }

        async fn delete(&self, partition: &str, key: &RequestKey) -> PostroomResult<bool> {
            self.inner.delete(partition, key).await
        }

        async fn len(&self, partition: &str) -> PostroomResult<usize> {
            self.inner.len(partition).await
        }
    }

    #[tokio::test]
    async fn failed_store_leaves_shell_untouched() {
        let storage = Arc::new(FailingPutStorage {
            inner: MemoryCacheStorage::new(),
            fail_on: 3,
            puts: AtomicUsize::new(0),
        });
        let previous = Url::parse("http://localhost:8080/css/admin.css").unwrap();
        storage
            .put("admin-shell-v1", &RequestKey::get(&previous), &Response::new(200, "old css"))
            .await
            .unwrap();

        let network = Arc::new(FakeNetwork::default());
        network.serve("http://localhost:8080/css/admin.css", Response::new(200, "new css"));
        network.serve("http://localhost:8080/js/config.js", Response::new(200, "config"));
        network.serve("http://localhost:8080/js/app-init.js", Response::new(200, "init"));
        let controller = CacheController::new(
            settings_with_assets(&["/css/admin.css", "/js/config.js", "/js/app-init.js"]),
            storage.clone(),
            network,
        );

        assert!(!controller.install().await);
        assert_eq!(storage.len("admin-shell-v1").await.unwrap(), 1);
        let restored = storage
            .get("admin-shell-v1", &RequestKey::get(&previous))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.body, b"old css");
    }

    #[tokio::test]
    async fn sync_tag_is_reserved_noop() {
        let (controller, _, network) = controller(settings_with_assets(&[]));
        assert!(controller.sync("refresh-mail-folders").await);
        assert!(!controller.sync("something-else").await);
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }
}
