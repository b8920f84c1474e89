//! Shared platform and release types for gremllm.
//!
//! Nothing in this crate performs I/O. It describes which native library
//! belongs to which platform and the shape of the release registry's
//! responses.

pub mod arch;
pub mod platform;
pub mod release;

// Re-exports
pub use arch::*;
pub use platform::*;
pub use release::*;
