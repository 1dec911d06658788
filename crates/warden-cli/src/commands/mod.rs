//! CLI command implementations

pub mod check;
pub mod hash;
pub mod verify;

use crate::OutputFormat;
use warden_core::AuthConfig;

/// Context passed to all commands
pub struct CommandContext {
    pub config: Option<AuthConfig>,
    pub output_format: OutputFormat,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print a JSON document on stdout
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg);
    }
}
