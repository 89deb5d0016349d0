//! Capabilities the host provides to a comparison.

use std::io;
use std::path::Path;

use crate::stage::ProgressUpdate;

/// Progress, log and notification surfaces.
pub trait Presenter {
    fn report_progress(&self, update: &ProgressUpdate);

    /// Append a line to the log.
    fn log_line(&self, text: &str);

    /// Replace the current log line, so only the latest value is visible.
    fn log_replace(&self, text: &str);

    fn notify_info(&self, message: &str);

    fn notify_error(&self, message: &str);
}

/// Opens a directory as a new editor window.
pub trait WindowOpener {
    /// Returns once the request has been accepted, not when the window closes.
    fn open(&self, dir: &Path) -> io::Result<()>;
}

/// Asks the user which branch to compare with.
pub trait BranchPrompt {
    /// `None` when the user dismissed the prompt.
    fn ask(&self) -> Option<String>;
}

/// The host capabilities handed to the orchestrator.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub prompt: &'a dyn BranchPrompt,
    pub presenter: &'a dyn Presenter,
    pub opener: &'a dyn WindowOpener,
}
