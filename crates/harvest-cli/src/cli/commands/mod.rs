//! CLI command handlers, one per file.

mod add;
mod import;
mod remove;
mod requeue;
mod run;
mod show;
mod status;

pub use add::run_add;
pub use import::run_import;
#[cfg(test)]
pub(crate) use import::parse_url_list;
pub use remove::run_remove;
pub use requeue::run_requeue;
pub use run::{run_batch, RunOptions};
pub use show::run_show;
pub use status::run_status;
