//! Core library for gremllm: native library provisioning, loading and
//! conversion.

pub mod config;
pub mod io;
pub mod native;
pub mod paths;
pub mod provision;
pub mod reporter;

pub use config::GremllmConfig;
pub use native::{Converter, LibraryLoader};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for outbound requests
pub const USER_AGENT: &str = concat!("gremllm/", env!("CARGO_PKG_VERSION"));
