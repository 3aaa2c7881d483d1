//! Terminal output for the CLI
//!
//! Uses `cliclack` styling in an interactive terminal and falls back to
//! plain tagged lines (`[OK]`, `[WARN]`) in CI and when piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, key_value_status, section, step_blocked, step_info, step_ok, step_ok_detail,
    step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
