//! Remote URL lookup using libgit2.

use std::path::Path;

use git2::Repository;

use super::GitError;

/// Reads the URL a project fetches from.
pub trait RemoteResolver {
    fn resolve(&self, project: &Path) -> Result<String, GitError>;
}

/// Resolves a named remote (normally `origin`) with libgit2.
pub struct Git2Resolver {
    remote: String,
}

impl Default for Git2Resolver {
    fn default() -> Self {
        Self::new("origin")
    }
}

impl Git2Resolver {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }
}

impl RemoteResolver for Git2Resolver {
    fn resolve(&self, project: &Path) -> Result<String, GitError> {
        let repo = open_repository(project)?;
        let remote = repo.find_remote(&self.remote).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::RemoteNotFound(self.remote.clone())
            } else {
                GitError::Git(e)
            }
        })?;

        let url = remote.url().ok_or_else(|| {
            GitError::ParseError(format!("URL of remote '{}' is not valid UTF-8", self.remote))
        })?;
        log::debug!("Remote '{}' of {} is {}", self.remote, project.display(), url);
        Ok(url.to_string())
    }
}

/// Open the repository containing `path`, searching parent directories.
fn open_repository(path: &Path) -> Result<Repository, GitError> {
    Repository::discover(path).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            GitError::NotFound(path.display().to_string())
        } else {
            GitError::Git(e)
        }
    })
}
