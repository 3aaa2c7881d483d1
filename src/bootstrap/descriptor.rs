//! Module descriptors and retry policy

use std::fmt;
use std::time::Duration;

/// Error returned by a module initializer
pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Result of running a module initializer
pub type InitResult = Result<(), InitError>;

/// Boxed zero-argument initializer
pub type InitFn = Box<dyn FnMut() -> InitResult + Send>;

/// Retry ceiling and linear backoff for a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before the module is abandoned
    pub max_attempts: u32,

    /// Backoff unit; the retry after attempt N waits `base_delay * N`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

    /// Delay before the retry that follows `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }
}

/// A registered page module
pub struct ModuleDescriptor {
    /// Unique module name
    pub name: String,

    /// Names of modules that must initialize first, in resolution order
    pub dependencies: Vec<String>,

    /// Attempts made so far
    pub attempts: u32,

    /// Retry ceiling and backoff
    pub policy: RetryPolicy,

    init: InitFn,
}

impl ModuleDescriptor {
    /// Create a descriptor with zero attempts
    pub fn new(
        name: impl Into<String>,
        init: InitFn,
        dependencies: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            dependencies,
            attempts: 0,
            policy,
            init,
        }
    }

    /// Whether the retry ceiling has been reached
    pub fn is_exhausted(&self) -> bool {
        !self.policy.allows_retry(self.attempts)
    }

    /// Record an attempt and run the initializer
    pub(crate) fn attempt(&mut self) -> InitResult {
        self.attempts += 1;
        (self.init)()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("attempts", &self.attempts)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Observable state of a registered module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Initializer succeeded
    Initialized,
    /// Not yet initialized; more attempts allowed
    Pending { attempts: u32 },
    /// Retry ceiling reached without success
    Abandoned { attempts: u32 },
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Pending { attempts } => write!(f, "pending ({} attempts)", attempts),
            Self::Abandoned { attempts } => write!(f, "abandoned after {} attempts", attempts),
        }
    }
}
