//! UI module for consistent CLI output
//!
//! Styled output with `console` and spinners with `indicatif`, falling back
//! to plain output in CI/non-interactive environments.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, remark, step_error_detail, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint};
pub use progress::TaskSpinner;
