//! Terminal output for pybake commands
//!
//! Uses `cliclack` for styled logs and prompts in a terminal, and falls back
//! to plain prefixed lines when output is piped or running under CI.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    check_line, intro, key_value, layer_line, outro_error, outro_success, outro_warn, remark,
    section, step_error_detail, step_info, step_ok, step_ok_detail, step_warn,
};
pub use progress::{BuildProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, PybakeTheme};
