//! gremllm - HTML to Markdown through a native converter
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs the platform's native conversion library, converts documents
//! with it, and serves Markdown views of pages requested with `?gremllm`.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.gremllm/
//! └── bin/        # Installed native library (libgremllm.so / .dylib / gremllm.dll)
//! ```

pub mod cmd;
pub mod ui;

pub use gremllm_core::USER_AGENT;
pub use gremllm_core::paths::*;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gremllm_core::io::release::{DEFAULT_API_BASE, DEFAULT_REPO};
use gremllm_schema::ReleaseTag;

#[derive(Debug, Parser)]
#[command(name = "gremllm")]
#[command(author, version, about = "gremllm - Markdown views of HTML pages")]
pub struct Cli {
    /// Debug logging for gremllm crates (unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download and install the native library for this machine
    Install {
        /// Release tag to install, or "latest"
        #[arg(long, default_value = "latest")]
        release: ReleaseTag,

        /// Repository publishing the releases (owner/name)
        #[arg(long, env = "GREMLLM_REPO", default_value = DEFAULT_REPO)]
        repo: String,

        /// Release registry API root
        #[arg(long, env = "GREMLLM_API_BASE", default_value = DEFAULT_API_BASE)]
        api_base: String,

        /// Install directory [default: ~/.gremllm/bin]
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Replace an existing installation
        #[arg(long)]
        force: bool,
    },

    /// Show the release artifact for this machine
    Platform,

    /// Show where the native library is searched for
    Locate,

    /// Convert an HTML document to Markdown on stdout
    Convert {
        /// HTML file, or "-" for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Extra element to strip (repeatable, added to GREMLLM_CONFIG's list)
        #[arg(long = "strip", value_name = "ELEMENT")]
        strip: Vec<String>,
    },

    /// Serve Markdown views of pages requested with ?gremllm
    Serve {
        /// Address to listen on
        #[arg(long, env = "GREMLLM_LISTEN", default_value = "127.0.0.1:3000")]
        listen: SocketAddr,

        /// Origin pages are fetched from; the request's Host is never dialled
        #[arg(long, env = "GREMLLM_INTERNAL_BASE_URL")]
        internal_base_url: String,

        /// Scheme assumed when X-Forwarded-Proto is absent
        #[arg(long, default_value = gremllm_server::DEFAULT_SCHEME)]
        default_scheme: String,
    },
}
