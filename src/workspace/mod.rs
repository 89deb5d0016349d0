//! Ephemeral workspaces for one comparison.
//!
//! A [`Workspace`] owns a uniquely named temporary directory. It ends in
//! exactly one of two ways: `release` deletes it, `keep` hands the path to
//! whoever opens it. Both consume the workspace, so it cannot be released
//! twice. A workspace that is dropped without either is deleted.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

/// Errors returned by workspace operations.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The OS could not allocate a temporary directory.
    #[error("failed to create temporary directory: {0}")]
    Create(#[source] io::Error),
    /// Removing the directory failed.
    #[error("failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A temporary directory owned by a single comparison.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the directory and everything in it.
    pub fn release(self) -> Result<(), WorkspaceError> {
        let path = self.dir.path().to_path_buf();
        log::debug!("Releasing workspace {}", path.display());
        self.dir
            .close()
            .map_err(|source| WorkspaceError::Remove { path, source })
    }

    /// Stop managing the directory and return its path. It is not deleted.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}

/// Creates and releases workspaces.
pub trait Provisioner {
    fn create(&self, prefix: &str) -> Result<Workspace, WorkspaceError>;

    fn release(&self, workspace: Workspace) -> Result<(), WorkspaceError> {
        workspace.release()
    }
}

/// Provisions workspaces under the OS temp directory (or a fixed root).
#[derive(Debug, Clone, Default)]
pub struct TempProvisioner {
    root: Option<PathBuf>,
}

impl TempProvisioner {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl Provisioner for TempProvisioner {
    fn create(&self, prefix: &str) -> Result<Workspace, WorkspaceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(WorkspaceError::Create)?;

        log::debug!("Created workspace {}", dir.path().display());
        Ok(Workspace::new(dir))
    }
}

/// Human-readable prefix `<projectDirName>_<branch>` for a workspace.
///
/// Path separators and control characters in the branch become `-` so the
/// prefix stays a single path component.
pub fn workspace_prefix(project: &Path, branch: &str) -> String {
    let project_name = project
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let branch: String = branch
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();

    format!("{}_{}", project_name, branch)
}
