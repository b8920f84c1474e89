//! Styled status lines on stderr.
//!
//! Download progress is redrawn in place when stderr is a terminal and
//! suppressed otherwise, so logs captured from CI stay readable.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{Clear, ClearType};
use gremllm_core::Reporter;

use super::theme::{Theme, format_size};

/// Handle for printing command status.
#[derive(Debug, Clone)]
pub struct Output {
    theme: Theme,
    interactive: bool,
    // A progress line is on screen without a trailing newline.
    progress_open: Arc<AtomicBool>,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output handle.
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            interactive: std::io::stderr().is_terminal(),
            progress_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Prints an error message.
    pub fn error(&self, msg: &str) {
        self.line(self.theme.icons.error, self.theme.colors.error, msg);
    }

    /// Prints a `label  value` pair with the value dimmed.
    pub fn field(&self, label: &str, value: &str) {
        self.close_progress();
        eprintln!(
            "  {:<14} {}",
            label,
            value.with(self.theme.colors.secondary)
        );
    }

    /// Prints a path with a found / missing marker.
    pub fn candidate(&self, path: &std::path::Path, exists: bool) {
        self.close_progress();
        let (icon, color) = if exists {
            (self.theme.icons.success, self.theme.colors.success)
        } else {
            (self.theme.icons.pending, self.theme.colors.secondary)
        };
        eprintln!("  {} {}", icon.with(color), path.display());
    }

    fn line(&self, icon: &str, color: Color, msg: &str) {
        self.close_progress();
        eprintln!("{} {}", icon.with(color), msg);
    }

    fn close_progress(&self) {
        if self.progress_open.swap(false, Ordering::Relaxed) {
            eprintln!();
        }
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        self.close_progress();
        eprintln!();
        eprintln!("{}", title.with(self.theme.colors.header).bold());
    }

    fn downloading(&self, name: &str, current: u64, total: Option<u64>) {
        if !self.interactive {
            return;
        }

        let progress = match total.filter(|&t| t > 0) {
            Some(t) => format!("{} / {}", format_size(current), format_size(t)),
            None => format_size(current),
        };
        let finished = total.is_some_and(|t| t > 0 && current >= t);

        let mut err = std::io::stderr().lock();
        let _ = err.queue(MoveToColumn(0));
        let _ = err.queue(Clear(ClearType::CurrentLine));
        let _ = write!(
            err,
            "  {} {} {}",
            self.theme.icons.active.with(self.theme.colors.active),
            name,
            progress.with(self.theme.colors.secondary)
        );
        if finished {
            let _ = writeln!(err);
        }
        let _ = err.flush();
        self.progress_open.store(!finished, Ordering::Relaxed);
    }

    fn info(&self, msg: &str) {
        self.line(self.theme.icons.info, self.theme.colors.secondary, msg);
    }

    fn success(&self, msg: &str) {
        self.line(self.theme.icons.success, self.theme.colors.success, msg);
    }

    fn warning(&self, msg: &str) {
        self.line(self.theme.icons.warning, self.theme.colors.warning, msg);
    }
}
