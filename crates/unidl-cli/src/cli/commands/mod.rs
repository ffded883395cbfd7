//! CLI command handlers, one file per command.

mod detect;
mod get;
mod status;

pub use detect::run_detect;
pub use get::{run_get, GetArgs};
pub use status::run_status;
