//! Git operations using a hybrid CLI + libgit2 approach.
//!
//! **CLI (with hardening) for the long-running stages that report progress:**
//! - clone, fetch and checkout are spawned with `--progress` and their stderr
//!   is parsed into progress events while they run
//!
//! **libgit2 for read operations:**
//! - resolving the URL of the `origin` remote of the project being compared

mod cli;
mod progress;
mod remote;

use thiserror::Error;

pub use cli::{GitCli, git_available};
pub use remote::{Git2Resolver, RemoteResolver};

/// Errors returned by git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// libgit2 reported an error.
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    /// Path does not contain a git repo.
    #[error("repository not found at {0}")]
    NotFound(String),
    /// The repository has no remote with the requested name.
    #[error("remote '{0}' is not configured")]
    RemoteNotFound(String),
    /// Output parsing or unexpected git data.
    #[error("failed to parse git data: {0}")]
    ParseError(String),
    /// Clone failed.
    #[error("clone failed: {0}")]
    CloneError(String),
    /// Fetch failed.
    #[error("fetch failed: {0}")]
    FetchError(String),
    /// Checkout failed.
    #[error("checkout failed: {0}")]
    CheckoutError(String),
    /// Underlying IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
