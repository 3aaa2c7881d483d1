//! Page bootstrap context
//!
//! `AppContext` owns the module registry and the document it initializes
//! against. Whoever bootstraps the page creates one and hands it (or a
//! mutable borrow) to anything that registers or queries modules.

use crate::bootstrap::descriptor::{InitResult, ModuleStatus, RetryPolicy};
use crate::bootstrap::document::{self, Document, Element, ReadyState, WaitOptions};
use crate::bootstrap::registry::Registry;
use crate::config::schema::BootstrapConfig;
use crate::error::PostroomResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Outcome of a bootstrap pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSummary {
    pub initialized: Vec<String>,
    pub pending: Vec<String>,
    pub abandoned: Vec<String>,
}

/// Explicit owner of page bootstrap state
pub struct AppContext {
    registry: Registry,
    document: Arc<dyn Document>,
    wait: WaitOptions,
}

impl AppContext {
    /// Create a context with default retry and polling settings
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self {
            registry: Registry::new(),
            document,
            wait: WaitOptions::default(),
        }
    }

    /// Create a context using the `[bootstrap]` settings
    pub fn from_config(config: &BootstrapConfig, document: Arc<dyn Document>) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        };
        Self {
            registry: Registry::with_policy(policy),
            document,
            wait: WaitOptions {
                poll_interval: Duration::from_millis(config.poll_interval_ms),
                max_wait: Duration::from_millis(config.element_timeout_ms),
            },
        }
    }

    /// Register a page module
    pub fn register<F>(&mut self, name: &str, init: F, dependencies: &[&str])
    where
        F: FnMut() -> InitResult + Send + 'static,
    {
        self.registry.register(name, init, dependencies);
    }

    /// Register a page module with its own retry policy
    pub fn register_with_policy<F>(
        &mut self,
        name: &str,
        init: F,
        dependencies: &[&str],
        policy: RetryPolicy,
    ) where
        F: FnMut() -> InitResult + Send + 'static,
    {
        self.registry
            .register_with_policy(name, init, dependencies, policy);
    }

    /// Initialize one module and its dependencies
    pub fn init_module(&mut self, name: &str) -> PostroomResult<bool> {
        self.registry.init_module(name)
    }

    /// Wait for the document structure, then attempt every registered module.
    ///
    /// Safe to call repeatedly; initialized modules are skipped. A dependency
    /// cycle is logged and the remaining modules are still attempted.
    pub async fn init(&mut self) -> InitSummary {
        if self.document.ready_state() == ReadyState::Loading {
            debug!("Document still loading, deferring module initialization");
            self.document.content_loaded().await;
        }

        for name in self.registry.names() {
            if let Err(e) = self.registry.init_module(&name) {
                error!(module = name.as_str(), error = %e, "Module cannot be initialized");
            }
        }

        let summary = self.summary();
        info!(
            initialized = summary.initialized.len(),
            pending = summary.pending.len(),
            retries = self.registry.pending_retries(),
            "Module initialization pass complete"
        );
        summary
    }

    /// Run scheduled retries as they fall due until none remain
    pub async fn settle(&mut self) -> InitSummary {
        while let Some(due) = self.registry.next_retry_due() {
            tokio::time::sleep_until(due).await;

            for task in self.registry.take_due_retries(Instant::now()) {
                if let Err(e) = self.registry.retry(&task) {
                    error!(module = task.module.as_str(), error = %e, "Retry failed");
                }
            }
        }
        self.summary()
    }

    /// `init` followed by `settle`
    pub async fn boot(&mut self) -> InitSummary {
        self.init().await;
        self.settle().await
    }

    /// Poll the document for `selector` and call back once it renders
    pub fn wait_for_element<F>(&self, selector: &str, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Element) + Send + 'static,
    {
        document::wait_for_element(self.document.clone(), selector, self.wait, callback)
    }

    /// Like `wait_for_element`, with a custom timeout
    pub fn wait_for_element_within<F>(
        &self,
        selector: &str,
        max_wait: Duration,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Element) + Send + 'static,
    {
        let options = WaitOptions {
            max_wait,
            ..self.wait
        };
        document::wait_for_element(self.document.clone(), selector, options, callback)
    }

    /// Per-module status snapshot
    pub fn summary(&self) -> InitSummary {
        let mut summary = InitSummary::default();
        for name in self.registry.names() {
            match self.registry.status(&name) {
                Some(ModuleStatus::Initialized) => summary.initialized.push(name),
                Some(ModuleStatus::Pending { .. }) => summary.pending.push(name),
                Some(ModuleStatus::Abandoned { .. }) => summary.abandoned.push(name),
                None => {}
            }
        }
        summary
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn document(&self) -> Arc<dyn Document> {
        self.document.clone()
    }
}
