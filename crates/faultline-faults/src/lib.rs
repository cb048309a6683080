//! Faultline Faults - modules that turn plan ticks into observable failures
//!
//! Every module implements [`faultline_planner::Plannable`] and reacts to
//! the values its plans publish:
//!
//! - [`ProcessManager`] (`process-manager`): startup delay and scheduled exit
//! - [`CpuLoader`] (`cpu-manager`): busy-loop load at the tick's percentage
//! - [`MemoryLeaker`] (`memory-leaker`): holds the tick's size in memory
//! - [`WebServer`] (`webserver-<interface>-<port>`): listens or goes down per tick
//! - [`Route`] (`<webserver>-route-<path>`): answers with random errors while failing
//!
//! Declarations are `serde` types validated on construction; runtime
//! start/stop operations are idempotent.

pub mod cpu;
pub mod error;
pub mod memory;
mod plan_source;
pub mod process;
pub mod web;

// Re-exports
pub use cpu::{CpuLoadConfig, CpuLoader, CPU_MANAGER};
pub use error::ModuleError;
pub use memory::{MemoryLeakConfig, MemoryLeaker, MEMORY_LEAKER};
pub use process::{
    ExitController, ProcessConfig, ProcessExitConfig, ProcessExitController, ProcessManager,
    PROCESS_MANAGER,
};
pub use web::{
    RequestInfo, Route, RouteConfig, RouteContent, RouteFaultConfig, WebServer, WebServerConfig,
    WebServerFaultConfig,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
