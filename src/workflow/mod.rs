//! The "Compare with Branch" workflow.
//!
//! Resolves the project's remote, provisions a workspace, runs clone, fetch
//! and checkout in strict sequence and opens the result as a new window.
//! Every failure or cancellation releases the workspace exactly once and is
//! reported to the user exactly once.

mod host;

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::git::{GitError, RemoteResolver};
use crate::stage::{CancellationToken, RepoClient, Stage, StageDescriptor, StageError, StageRunner};
use crate::workspace::{Provisioner, Workspace, WorkspaceError, workspace_prefix};

pub use host::{BranchPrompt, Host, Presenter, WindowOpener};

/// States of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    ResolvingRemote,
    Provisioning,
    Cloning,
    Fetching,
    CheckingOut,
    Opening,
    Done,
    Aborting,
}

impl WorkflowState {
    fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Clone => Self::Cloning,
            Stage::Fetch => Self::Fetching,
            Stage::Checkout => Self::CheckingOut,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ResolvingRemote => "resolving remote",
            Self::Provisioning => "provisioning",
            Self::Cloning => "cloning",
            Self::Fetching => "fetching",
            Self::CheckingOut => "checking out",
            Self::Opening => "opening",
            Self::Done => "done",
            Self::Aborting => "aborting",
        };
        f.write_str(name)
    }
}

/// When the new window is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenTiming {
    /// Once checkout has finished; the window never shows a partial tree.
    #[default]
    AfterCheckout,
    /// Right after the workspace is created; the tree fills in while the
    /// stages run.
    Immediate,
}

/// Errors that end a comparison.
#[derive(Error, Debug)]
pub enum CompareError {
    /// No branch name or no open project.
    #[error("{0}")]
    MissingInput(&'static str),
    #[error("error getting remote URL: {0}")]
    RemoteResolution(#[source] GitError),
    #[error("error creating temporary directory: {0}")]
    Provisioning(#[source] WorkspaceError),
    /// The git error already names the stage.
    #[error("{source}")]
    Stage {
        stage: Stage,
        #[source]
        source: GitError,
    },
    #[error("operation cancelled by user while {during}")]
    Cancelled { during: WorkflowState },
    #[error("failed to open {}: {source}", path.display())]
    WindowOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<StageError> for CompareError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Failed { stage, source } => Self::Stage { stage, source },
            StageError::Cancelled { stage } => Self::Cancelled {
                during: WorkflowState::for_stage(stage),
            },
        }
    }
}

/// Input for one invocation.
#[derive(Debug, Clone, Default)]
pub struct CompareRequest {
    /// Root of the open project, if any.
    pub project: Option<PathBuf>,
    /// Branch to compare with; the user is prompted when absent.
    pub branch: Option<String>,
}

/// Sequences one comparison from prompt to opened window.
pub struct Orchestrator<'a> {
    host: Host<'a>,
    resolver: &'a dyn RemoteResolver,
    provisioner: &'a dyn Provisioner,
    client: &'a dyn RepoClient,
    token: CancellationToken,
    open_timing: OpenTiming,
    history: Vec<WorkflowState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        host: Host<'a>,
        resolver: &'a dyn RemoteResolver,
        provisioner: &'a dyn Provisioner,
        client: &'a dyn RepoClient,
        token: CancellationToken,
    ) -> Self {
        Self {
            host,
            resolver,
            provisioner,
            client,
            token,
            open_timing: OpenTiming::default(),
            history: vec![WorkflowState::Idle],
        }
    }

    pub fn with_open_timing(mut self, open_timing: OpenTiming) -> Self {
        self.open_timing = open_timing;
        self
    }

    /// States entered during the last run, starting with `Idle`.
    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    pub fn state(&self) -> WorkflowState {
        self.history
            .last()
            .copied()
            .unwrap_or(WorkflowState::Idle)
    }

    /// Run one comparison and report its outcome to the user.
    ///
    /// On success returns the directory now owned by the opened window.
    pub fn run(&mut self, request: CompareRequest) -> Result<PathBuf, CompareError> {
        self.history.clear();
        self.history.push(WorkflowState::Idle);

        let result = self.execute(request);
        match &result {
            Ok(path) => {
                log::info!("Comparison ready at {}", path.display());
                self.host
                    .presenter
                    .notify_info("Repository cloned and branch checked out successfully.");
            }
            Err(e) => {
                log::debug!("Comparison failed: {:?}", e);
                let message = format!("Error: {}", e);
                self.host.presenter.log_line(&message);
                self.host.presenter.notify_error(&message);
            }
        }
        result
    }

    fn execute(&mut self, request: CompareRequest) -> Result<PathBuf, CompareError> {
        let branch = match request.branch {
            Some(branch) => Some(branch),
            None => self.host.prompt.ask(),
        }
        .filter(|branch| !branch.is_empty())
        .ok_or(CompareError::MissingInput("Branch name is required"))?;

        let project = request
            .project
            .filter(|project| project.is_dir())
            .ok_or(CompareError::MissingInput("No project folder is open"))?;

        self.enter(WorkflowState::ResolvingRemote);
        let url = match self.resolver.resolve(&project) {
            Ok(url) => url,
            Err(e) => return Err(self.abort(None, CompareError::RemoteResolution(e))),
        };

        self.enter(WorkflowState::Provisioning);
        if self.token.is_cancelled() {
            let err = CompareError::Cancelled {
                during: WorkflowState::Provisioning,
            };
            return Err(self.abort(None, err));
        }
        let workspace = match self.provisioner.create(&workspace_prefix(&project, &branch)) {
            Ok(workspace) => workspace,
            Err(e) => return Err(self.abort(None, CompareError::Provisioning(e))),
        };
        let dir = workspace.path().to_path_buf();

        if self.open_timing == OpenTiming::Immediate {
            // Fire and forget: the stages continue whether or not it opened.
            if let Err(e) = self.host.opener.open(&dir) {
                log::warn!("Failed to open {}: {}", dir.display(), e);
            }
        }

        let token = self.token.clone();
        let runner = StageRunner::new(self.client, self.host.presenter, &token);
        for descriptor in StageDescriptor::sequence(&url, &dir, &branch) {
            self.enter(WorkflowState::for_stage(descriptor.stage()));
            if let Err(e) = runner.run(&descriptor) {
                return Err(self.abort(Some(workspace), e.into()));
            }
        }

        self.enter(WorkflowState::Opening);
        if self.open_timing == OpenTiming::AfterCheckout {
            if let Err(source) = self.host.opener.open(&dir) {
                let err = CompareError::WindowOpen { path: dir, source };
                return Err(self.abort(Some(workspace), err));
            }
        }

        let path = workspace.keep();
        self.enter(WorkflowState::Done);
        Ok(path)
    }

    fn enter(&mut self, state: WorkflowState) {
        log::debug!("{} -> {}", self.state(), state);
        self.history.push(state);
    }

    /// Release the workspace, if one was created, and return to idle.
    fn abort(&mut self, workspace: Option<Workspace>, err: CompareError) -> CompareError {
        self.enter(WorkflowState::Aborting);
        if let Some(workspace) = workspace {
            let path = workspace.path().to_path_buf();
            if let Err(e) = self.provisioner.release(workspace) {
                log::warn!("Failed to clean up {}: {}", path.display(), e);
            }
        }
        self.enter(WorkflowState::Idle);
        err
    }
}
