//! Native conversion library boundary.
//!
//! [`loader`] finds and opens the shared library once per process;
//! [`bridge`] marshals a single conversion across the C ABI and owns the
//! returned buffer until it has been copied and released.

pub mod bridge;
pub mod loader;

pub use bridge::{ConversionError, Converter};
pub use loader::{ConvertFn, FreeFn, LibraryHandle, LibraryLoader, LoadError, NativeApi, loaded};
