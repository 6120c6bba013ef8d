#![forbid(unsafe_code)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod recording;
pub mod report;

pub use cli::run_from_env;
pub use error::{CliError, Result};
