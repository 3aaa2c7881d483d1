//! Module registry with dependency-ordered initialization
//!
//! Modules register an initializer and the names they depend on.
//! `init_module` resolves dependencies depth-first before running the
//! module's own initializer. Failures are retried through the
//! [`RetryQueue`] with linear backoff until the module's ceiling is
//! reached, after which the module is abandoned.

use crate::bootstrap::descriptor::{
    InitResult, ModuleDescriptor, ModuleStatus, RetryPolicy,
};
use crate::bootstrap::scheduler::{RetryQueue, RetryTask};
use crate::error::{PostroomError, PostroomResult};
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Dry-run initialization order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
    /// Modules in the order they would initialize
    pub order: Vec<String>,
    /// (module, missing dependency) pairs that can never resolve
    pub blocked: Vec<(String, String)>,
}

/// Registry of page modules
#[derive(Debug)]
pub struct Registry {
    modules: HashMap<String, ModuleDescriptor>,
    registration_order: Vec<String>,
    initialized: HashSet<String>,
    retries: RetryQueue,
    default_policy: RetryPolicy,
}

impl Registry {
    /// Create an empty registry using the default retry policy
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    /// Create an empty registry with a custom default retry policy
    pub fn with_policy(default_policy: RetryPolicy) -> Self {
        Self {
            modules: HashMap::new(),
            registration_order: Vec::new(),
            initialized: HashSet::new(),
            retries: RetryQueue::new(),
            default_policy,
        }
    }

    /// Register a module. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<F>(&mut self, name: &str, init: F, dependencies: &[&str])
    where
        F: FnMut() -> InitResult + Send + 'static,
    {
        self.register_with_policy(name, init, dependencies, self.default_policy);
    }

    /// Register a module with its own retry policy
    pub fn register_with_policy<F>(
        &mut self,
        name: &str,
        init: F,
        dependencies: &[&str],
        policy: RetryPolicy,
    ) where
        F: FnMut() -> InitResult + Send + 'static,
    {
        let dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        let descriptor = ModuleDescriptor::new(name, Box::new(init), dependencies, policy);

        if self.modules.insert(name.to_string(), descriptor).is_some() {
            debug!("Replacing registration for module {}", name);
            self.initialized.remove(name);
            self.retries.cancel(name);
        } else {
            self.registration_order.push(name.to_string());
        }
    }

    /// Bring `name` to the initialized state.
    ///
    /// Returns `Ok(true)` when the module is (or already was) initialized,
    /// or when no such module is registered. Returns `Ok(false)` when a
    /// dependency could not be resolved or the initializer failed; in the
    /// latter case a retry may have been scheduled. A dependency cycle is an
    /// error.
    pub fn init_module(&mut self, name: &str) -> PostroomResult<bool> {
        if !self.modules.contains_key(name) && !self.initialized.contains(name) {
            debug!("Module {} is not registered, nothing to initialize", name);
            return Ok(true);
        }

        let mut trail = Vec::new();
        self.resolve(name, &mut trail)
    }

    fn resolve(&mut self, name: &str, trail: &mut Vec<String>) -> PostroomResult<bool> {
        if self.initialized.contains(name) {
            return Ok(true);
        }

        if let Some(start) = trail.iter().position(|n| n == name) {
            let mut cycle = trail[start..].to_vec();
            cycle.push(name.to_string());
            return Err(PostroomError::DependencyCycle {
                cycle: cycle.join(" -> "),
            });
        }

        let dependencies = match self.modules.get(name) {
            Some(descriptor) => descriptor.dependencies.clone(),
            None => return Ok(false),
        };

        trail.push(name.to_string());
        for dependency in &dependencies {
            if !self.modules.contains_key(dependency) && !self.initialized.contains(dependency) {
                warn!(
                    module = name,
                    dependency = dependency.as_str(),
                    "Dependency is not registered"
                );
                trail.pop();
                return Ok(false);
            }

            if !self.resolve(dependency, trail)? {
                debug!("Module {} waiting on dependency {}", name, dependency);
                trail.pop();
                return Ok(false);
            }
        }
        trail.pop();

        Ok(self.attempt(name))
    }

    fn attempt(&mut self, name: &str) -> bool {
        let Some(descriptor) = self.modules.get_mut(name) else {
            return false;
        };

        if descriptor.is_exhausted() {
            debug!(
                "Module {} abandoned after {} attempts",
                name, descriptor.attempts
            );
            return false;
        }

        match descriptor.attempt() {
            Ok(()) => {
                info!(
                    module = name,
                    attempts = descriptor.attempts,
                    "Module initialized"
                );
                self.initialized.insert(name.to_string());
                self.retries.cancel(name);
                true
            }
            Err(e) => {
                let attempts = descriptor.attempts;
                let policy = descriptor.policy;
                warn!(module = name, attempt = attempts, error = %e, "Module initialization failed");

                if policy.allows_retry(attempts) {
                    let delay = policy.delay_for(attempts);
                    if self.retries.schedule(name, attempts, delay) {
                        debug!("Retrying {} in {:?}", name, delay);
                    }
                } else {
                    error!(
                        module = name,
                        attempts, "Module abandoned after reaching retry limit"
                    );
                }
                false
            }
        }
    }

    /// Run a retry task taken from the queue
    pub fn retry(&mut self, task: &RetryTask) -> PostroomResult<bool> {
        debug!("Running retry of {} after attempt {}", task.module, task.attempt);
        self.init_module(&task.module)
    }

    /// Remove retries due at or before `now`
    pub fn take_due_retries(&mut self, now: Instant) -> Vec<RetryTask> {
        self.retries.take_due(now)
    }

    /// When the next retry falls due
    pub fn next_retry_due(&self) -> Option<Instant> {
        self.retries.next_due()
    }

    /// Number of retries waiting to run
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    /// Whether `name` has been initialized
    pub fn is_initialized(&self, name: &str) -> bool {
        self.initialized.contains(name)
    }

    /// Current status of a registered module
    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        let descriptor = self.modules.get(name)?;
        Some(if self.initialized.contains(name) {
            ModuleStatus::Initialized
        } else if descriptor.is_exhausted() {
            ModuleStatus::Abandoned {
                attempts: descriptor.attempts,
            }
        } else {
            ModuleStatus::Pending {
                attempts: descriptor.attempts,
            }
        })
    }

    /// Attempts made for a registered module
    pub fn attempts(&self, name: &str) -> Option<u32> {
        self.modules.get(name).map(|d| d.attempts)
    }

    /// Registered module names in registration order
    pub fn names(&self) -> Vec<String> {
        self.registration_order.clone()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Compute the initialization order without running any initializer
    pub fn load_order(&self) -> PostroomResult<LoadPlan> {
        let mut plan = LoadPlan::default();
        let mut done = HashSet::new();

        for name in &self.registration_order {
            let mut trail = Vec::new();
            self.visit(name, &mut trail, &mut done, &mut plan)?;
        }

        Ok(plan)
    }

    /// Returns whether `name` can be resolved
    fn visit(
        &self,
        name: &str,
        trail: &mut Vec<String>,
        done: &mut HashSet<String>,
        plan: &mut LoadPlan,
    ) -> PostroomResult<bool> {
        if done.contains(name) {
            return Ok(plan.order.iter().any(|n| n == name));
        }
        if let Some(start) = trail.iter().position(|n| n == name) {
            let mut cycle = trail[start..].to_vec();
            cycle.push(name.to_string());
            return Err(PostroomError::DependencyCycle {
                cycle: cycle.join(" -> "),
            });
        }

        let Some(descriptor) = self.modules.get(name) else {
            return Ok(false);
        };

        trail.push(name.to_string());
        let mut resolvable = true;
        for dependency in &descriptor.dependencies {
            if !self.modules.contains_key(dependency) {
                plan.blocked.push((name.to_string(), dependency.clone()));
                resolvable = false;
            } else if !self.visit(dependency, trail, done, plan)? {
                resolvable = false;
            }
        }
        trail.pop();

        done.insert(name.to_string());
        if resolvable {
            plan.order.push(name.to_string());
        }
        Ok(resolvable)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
