//! Release registry wire types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which release to install.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReleaseTag {
    /// Whatever the registry currently marks as latest.
    #[default]
    Latest,
    /// A specific tag such as `v0.4.2`.
    Pinned(String),
}

impl ReleaseTag {
    /// Path segment below `/repos/{repo}/releases/` that selects this release.
    pub fn api_path(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Pinned(tag) => format!("tags/{tag}"),
        }
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Pinned(tag) => f.write_str(tag),
        }
    }
}

impl FromStr for ReleaseTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Release tag must not be empty".to_string());
        }
        if s.eq_ignore_ascii_case("latest") {
            Ok(Self::Latest)
        } else {
            Ok(Self::Pinned(s.to_string()))
        }
    }
}

/// A release as returned by the registry API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseManifest {
    /// Tag the release was cut from.
    pub tag_name: String,
    /// Downloadable files attached to the release.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// File name of the asset.
    pub name: String,
    /// Direct download URL (usually redirects to a CDN).
    pub browser_download_url: String,
}

impl ReleaseManifest {
    /// Find an asset by exact name.
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    /// Names of every attached asset, in registry order.
    pub fn asset_names(&self) -> Vec<&str> {
        self.assets.iter().map(|asset| asset.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_tag_parse() {
        assert_eq!("latest".parse::<ReleaseTag>().unwrap(), ReleaseTag::Latest);
        assert_eq!("LATEST".parse::<ReleaseTag>().unwrap(), ReleaseTag::Latest);
        assert_eq!(
            "v1.2.0".parse::<ReleaseTag>().unwrap(),
            ReleaseTag::Pinned("v1.2.0".to_string())
        );
        assert!(" ".parse::<ReleaseTag>().is_err());
    }

    #[test]
    fn test_api_path() {
        assert_eq!(ReleaseTag::Latest.api_path(), "latest");
        assert_eq!(
            ReleaseTag::Pinned("v1.2.0".to_string()).api_path(),
            "tags/v1.2.0"
        );
    }

    #[test]
    fn test_manifest_ignores_unknown_fields() {
        let json = r#"{
            "tag_name": "v0.3.0",
            "draft": false,
            "assets": [
                {"name": "libgremllm-linux-amd64.tar.gz", "size": 10,
                 "browser_download_url": "https://example.com/a.tar.gz"}
            ]
        }"#;
        let manifest: ReleaseManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.tag_name, "v0.3.0");
        assert!(manifest.find_asset("libgremllm-linux-amd64.tar.gz").is_some());
        assert!(manifest.find_asset("libgremllm-linux-arm64.tar.gz").is_none());
    }
}
