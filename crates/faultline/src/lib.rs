//! Faultline - controllable fault-injection harness
//!
//! Loads a configuration document, wires the declared fault modules to
//! their plans and runs them:
//!
//! - [`config`]: JSON/YAML documents from a file or stdin
//! - [`prepare`]: validation and wiring, then startup
//! - [`logging`]: subscriber bootstrap for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use faultline::prelude::*;
//!
//! let config = Config::load("faultline.yaml")?;
//! let prepared = PreparedConfig::new(&config, PlannerSettings::default())?;
//! let running = prepared.start().await;
//! running.wait().await;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod prepare;

// Re-exports
pub use config::Config;
pub use error::ConfigError;
pub use logging::LogFormat;
pub use prepare::{PreparedConfig, Running};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{Config, ConfigError, LogFormat, PreparedConfig, Running};
    pub use faultline_planner::PlannerSettings;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
