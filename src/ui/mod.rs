//! Terminal output for the `shelf` binary
//!
//! Uses `cliclack` for styled output in interactive terminals, with an
//! automatic fallback to plain `[OK]`/`[WARN]` lines in CI and when output
//! is piped.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, step_error_detail,
    step_info, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
