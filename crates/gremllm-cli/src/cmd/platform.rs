//! `gremllm platform`
use anyhow::Result;
use gremllm_core::Reporter;
use gremllm_schema::PlatformKey;

use crate::ui::Output;

/// Print the artifact this machine would install.
pub fn platform() -> Result<()> {
    let output = Output::new();
    let key = PlatformKey::current()?;
    let descriptor = key.descriptor()?;

    output.section(&format!("Platform {key}"));
    output.field("archive", descriptor.archive_name);
    output.field("format", &descriptor.archive_format.to_string());
    output.field("library", descriptor.canonical_output_name);
    output.field(
        "install path",
        &gremllm_core::library_path(descriptor).display().to_string(),
    );
    Ok(())
}
