//! Terminal output for gremllm commands.
//!
//! Everything here writes to stderr; stdout carries converted documents.

pub mod output;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
