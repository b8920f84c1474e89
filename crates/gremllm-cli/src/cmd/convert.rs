//! `gremllm convert`
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use gremllm_core::{Converter, GremllmConfig, LibraryLoader};

/// Convert a file (or stdin for `-`) and write Markdown to stdout.
///
/// Conversion failures are not errors: the input is echoed unchanged and
/// the reason is logged, the same fallback the server applies.
pub fn convert(config: &GremllmConfig, input: &Path, strip: &[String]) -> Result<()> {
    let html = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read HTML from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };

    let elements: Vec<String> = config
        .elements_to_strip
        .iter()
        .chain(strip)
        .cloned()
        .collect();

    let converter = Converter::new(LibraryLoader::from_config(config)?);
    let markdown = converter.convert(&html, &elements[..]);

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(markdown.as_bytes())
        .context("Failed to write output")?;
    if !markdown.is_empty() && !markdown.ends_with('\n') {
        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}
