//! `gremllm locate`
use anyhow::Result;
use gremllm_core::native::LoadError;
use gremllm_core::{GremllmConfig, LibraryLoader, Reporter};

use crate::ui::Output;

/// Print the loader's search list, marking the candidates that exist.
pub fn locate(config: &GremllmConfig) -> Result<()> {
    let output = Output::new();
    let loader = LibraryLoader::from_config(config)?;

    output.section("Native library search path");
    for path in loader.candidates() {
        output.candidate(path, path.is_file());
    }

    match loader.locate() {
        Ok(path) => {
            output.success(&format!("Using {}", path.display()));
            Ok(())
        }
        Err(LoadError::NotFound { .. }) => {
            output.error("Native library not found; run `gremllm install`");
            Err(anyhow::anyhow!("native library not found"))
        }
        Err(e) => Err(e.into()),
    }
}
