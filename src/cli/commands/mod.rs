//! CLI command implementations.

mod config;
mod export;
mod list;
mod models;
mod run;
mod stats;
mod status;

pub use config::run_config;
pub use export::run_export;
pub use list::run_list;
pub use models::run_models;
pub use run::{run_pipeline, RunParams};
pub use stats::run_stats;
pub use status::run_status;
