//! Application configuration

use crate::engine::EngineConfig;
use crate::error::Result;
use std::path::PathBuf;

/// Settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Engine configuration file given on the command line
    pub engine_config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            engine_config_path: None,
        }
    }

    pub fn with_engine_config(mut self, path: Option<PathBuf>) -> Self {
        self.engine_config_path = path;
        self
    }

    /// Engine settings from the configured file (if any) and the environment
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::load(self.engine_config_path.as_deref())
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,hyper=debug,reqwest=debug",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
