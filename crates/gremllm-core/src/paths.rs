use dirs::home_dir;
use gremllm_schema::ArtifactDescriptor;
use std::path::PathBuf;

/// Returns the primary data directory, or None if the user's home cannot be resolved.
pub fn try_gremllm_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("GREMLLM_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".gremllm"))
}

/// Returns the gremllm home directory (`~/.gremllm`).
///
/// Falls back to `.gremllm` relative to the working directory when neither
/// `GREMLLM_HOME` is set nor a home directory can be resolved.
pub fn gremllm_home() -> PathBuf {
    try_gremllm_home().unwrap_or_else(|| PathBuf::from(".gremllm"))
}

/// Native library directory: ~/.gremllm/bin
pub fn bin_path() -> PathBuf {
    gremllm_home().join("bin")
}

/// Canonical install path of the native library for `descriptor`.
pub fn library_path(descriptor: &ArtifactDescriptor) -> PathBuf {
    bin_path().join(descriptor.canonical_output_name)
}

/// Extract the filename from a URL, ignoring any query string.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or("");
    path.split('/').next_back().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/dl/libgremllm-linux-amd64.tar.gz"),
            "libgremllm-linux-amd64.tar.gz"
        );
        assert_eq!(
            filename_from_url("https://cdn.example.com/a/b.zip?sig=abc#frag"),
            "b.zip"
        );
        assert_eq!(filename_from_url(""), "");
    }
}
