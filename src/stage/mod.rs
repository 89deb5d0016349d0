//! The three repository stages (clone, fetch, checkout) and the client seam
//! they run against.

mod cancel;
mod runner;

use std::fmt;
use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;

use crate::git::GitError;

pub use cancel::CancellationToken;
pub use runner::{StageError, StageRunner};

/// One of the sequential repository operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clone,
    Fetch,
    Checkout,
}

impl Stage {
    /// The git verb for this stage, also used as the progress `method`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Fetch => "fetch",
            Self::Checkout => "checkout",
        }
    }

    /// Prefix shown in front of every progress label of this stage.
    pub fn label_prefix(self) -> &'static str {
        match self {
            Self::Clone => "CLONING...",
            Self::Fetch => "FETCHING...",
            Self::Checkout => "CHECKING OUT...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The concrete operation a stage performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOperation {
    /// Clone `url` into the (empty) directory `dest`.
    Clone { url: String, dest: PathBuf },
    /// Fetch from the default remote of `repo`, no further arguments.
    Fetch { repo: PathBuf },
    /// Check out `branch` in `repo`.
    Checkout { repo: PathBuf, branch: String },
}

impl StageOperation {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Clone { .. } => Stage::Clone,
            Self::Fetch { .. } => Stage::Fetch,
            Self::Checkout { .. } => Stage::Checkout,
        }
    }

    /// Directory the operation acts on.
    pub fn target(&self) -> &Path {
        match self {
            Self::Clone { dest, .. } => dest,
            Self::Fetch { repo } | Self::Checkout { repo, .. } => repo,
        }
    }
}

/// Everything needed to run and label one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: &'static str,
    pub label_prefix: &'static str,
    pub operation: StageOperation,
}

impl StageDescriptor {
    pub fn new(operation: StageOperation) -> Self {
        let stage = operation.stage();
        Self {
            name: stage.name(),
            label_prefix: stage.label_prefix(),
            operation,
        }
    }

    pub fn stage(&self) -> Stage {
        self.operation.stage()
    }

    /// The clone, fetch, checkout sequence for one comparison.
    pub fn sequence(url: &str, dir: &Path, branch: &str) -> [StageDescriptor; 3] {
        [
            Self::new(StageOperation::Clone {
                url: url.to_string(),
                dest: dir.to_path_buf(),
            }),
            Self::new(StageOperation::Fetch {
                repo: dir.to_path_buf(),
            }),
            Self::new(StageOperation::Checkout {
                repo: dir.to_path_buf(),
                branch: branch.to_string(),
            }),
        ]
    }
}

/// A raw progress report from the repository client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub method: String,
    pub phase: String,
    pub percent: u8,
}

/// A progress report normalized for the progress surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// `<prefix> <method> <phase>`
    pub label: String,
    pub percent: u8,
    /// Growth since the last report of the same method and phase.
    pub increment: u8,
}

/// An operation the client has started.
///
/// `events` yields progress until the operation ends and then disconnects;
/// `wait` resolves the operation exactly once.
pub trait RunningOperation {
    fn events(&self) -> &Receiver<ProgressEvent>;

    /// Stop the operation in flight.
    fn abort(&mut self) -> Result<(), GitError>;

    /// Wait for the terminal outcome, returning any diagnostic text.
    fn wait(self: Box<Self>) -> Result<String, GitError>;
}

/// The version-control client that does the actual network and disk work.
pub trait RepoClient {
    fn start(&self, operation: &StageOperation) -> Result<Box<dyn RunningOperation>, GitError>;
}
