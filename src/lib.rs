//! Postroom - bootstrap and offline support for the admin mail pages
//!
//! Orders and retries page module initialization, and caches the
//! application shell and API responses so the pages keep working offline.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod offline;
pub mod ui;

pub use error::{PostroomError, PostroomResult};
