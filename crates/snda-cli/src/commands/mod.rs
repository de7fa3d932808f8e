//! CLI command implementations

pub mod configure;
pub mod cp;
pub mod ls;
pub mod mb;
pub mod presign;
pub mod rb;
pub mod rm;

use crate::config::Profile;
use crate::storage;
use crate::OutputFormat;
use anyhow::Result;
use snda_client::ThreadedService;

/// Context passed to all commands
pub struct CommandContext {
    pub profile: Profile,
    pub profile_name: Option<String>,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn connect(&self) -> Result<ThreadedService> {
        storage::connect(&self.profile)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print a message unless quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }
}
