//! CLI command implementations

pub mod app;
pub mod error;
pub mod path;
pub mod validate;

pub use app::{Cli, Commands, ConfigArgs};
pub use error::CliError;
pub use path::PathCommand;
pub use validate::ValidateCommand;
