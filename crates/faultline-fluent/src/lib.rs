//! Fluent value specifications
//!
//! A tiny grammar shared by every time-varying knob in a fault plan:
//! - `<scalar>` - exactly that value
//! - `<scalar> to <scalar>` - a random value in the (normalized) range
//! - `<scalar>, <scalar>, ...` - a literal list, replayed in order by plans
//!
//! Scalars come in three flavours: plain floats (percentages), durations
//! (`200ms`, `5s`, `1m8s100ms`) and byte sizes (`512`, `100Ki`, `60M`, `1Gi`).
//!
//! # Example
//!
//! ```rust
//! use faultline_fluent::{FloatSpec, SizeSpec, ByteSize};
//!
//! let pct: FloatSpec = "0, 30, 70".parse().unwrap();
//! assert_eq!(pct.snapshot_len(), 3);
//!
//! let size: SizeSpec = "2Mi".parse().unwrap();
//! assert_eq!(size.draw(), ByteSize(2 * 1024 * 1024));
//! ```

pub mod error;
pub mod scalar;
pub mod size;
pub mod spec;

pub use error::ParseError;
pub use scalar::Scalar;
pub use size::ByteSize;
pub use spec::{SpecKind, ValueSpec};

use std::time::Duration;

/// Percentage-like float specification
pub type FloatSpec = ValueSpec<f64>;

/// Duration specification
pub type DurationSpec = ValueSpec<Duration>;

/// Byte size specification
pub type SizeSpec = ValueSpec<ByteSize>;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
