//! Page module bootstrap
//!
//! Feature modules register an initializer and their dependencies with an
//! [`AppContext`]. Once the document structure is parsed every module is
//! initialized in dependency order; initializers that fail (typically
//! because their elements have not rendered yet) are retried with linear
//! backoff up to a ceiling.
//!
//! # Module States
//!
//! | State | Description |
//! |-------|-------------|
//! | Pending | Registered, not yet succeeded, attempts remain |
//! | Initialized | Initializer succeeded; never runs again |
//! | Abandoned | Retry ceiling reached without success |

pub mod context;
pub mod descriptor;
pub mod document;
pub mod registry;
pub mod scheduler;

pub use context::{AppContext, InitSummary};
pub use descriptor::{InitError, InitResult, ModuleDescriptor, ModuleStatus, RetryPolicy};
pub use document::{
    find_element, wait_for_element, Document, Element, PageDocument, ReadyState, WaitOptions,
};
pub use registry::{LoadPlan, Registry};
pub use scheduler::{RetryQueue, RetryTask};
