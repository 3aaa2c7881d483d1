//! CLI command implementations

pub mod cache;
pub mod config;
pub mod fetch;
mod host;
pub mod plan;
pub mod status;

pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use plan::execute as plan;
pub use status::execute as status;
