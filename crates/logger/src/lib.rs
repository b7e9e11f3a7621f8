//! Shared tracing setup for the chainwatch binaries.

mod tracing;

pub use self::tracing::{LogFormat, init, init_with_level};
