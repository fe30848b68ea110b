#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the Herald event subsystem.
//!
//! A single [`Config`] holds the process-wide event defaults and the logging
//! setup. It is loaded once at startup and handed to the crates that use it;
//! dispatchers read the event defaults only at construction.
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **File** (an optional TOML file passed to [`Config::load`])
//! 2. **Environment variables** (`HERALD_*`)
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Usage
//!
//! ```rust,no_run
//! use herald_config::Config;
//!
//! let config = Config::load(Some(std::path::Path::new("herald.toml"))).unwrap();
//! println!("max listeners: {}", config.events.max_listeners);
//! ```

/// Environment variable mappings.
pub mod env;
/// Configuration error types.
pub mod error;
/// Layer loading.
pub mod loader;
/// Deep merging of TOML layers.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load defaults, then the process environment, then `file` if given.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an environment value cannot be coerced,
    /// the file is malformed, or the merged configuration fails validation.
    pub fn load(file: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(file, &env::collect_env_vars())
    }

    /// Load with an explicit environment map instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_with_env<S: std::hash::BuildHasher>(
        file: Option<&std::path::Path>,
        env_vars: &std::collections::HashMap<String, String, S>,
    ) -> ConfigResult<Self> {
        loader::load(file, env_vars)
    }

    /// Load a single file on top of the embedded defaults, ignoring the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
