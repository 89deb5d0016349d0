//! Test doubles and fixtures shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use git2::{Repository, Signature};
use tempfile::TempDir;

use crate::git::{GitError, RemoteResolver, git_available};
use crate::stage::{
    CancellationToken, ProgressEvent, ProgressUpdate, RepoClient, RunningOperation, Stage,
    StageOperation,
};
use crate::workflow::{BranchPrompt, Presenter, WindowOpener};
use crate::workspace::{Provisioner, TempProvisioner, Workspace, WorkspaceError};

/// Ordered record of side effects across several doubles.
pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn require_git() -> bool {
    if git_available("git") {
        true
    } else {
        eprintln!("skipping test that needs the git executable");
        false
    }
}

/// A bare origin repository with a default branch and `release-1.2`.
pub struct OriginFixture {
    path: PathBuf,
}

impl OriginFixture {
    pub const BRANCH: &'static str = "release-1.2";
    pub const MAIN_README: &'static str = "main\n";
    pub const BRANCH_README: &'static str = "release\n";

    pub fn create(path: &Path) -> Self {
        let repo = Repository::init_bare(path).expect("init origin");
        let sig = Signature::now("Fixture", "fixture@example.com").expect("signature");

        let main_tree = readme_tree(&repo, Self::MAIN_README);
        let main_commit = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &main_tree, &[])
            .expect("commit main");
        let main_commit = repo.find_commit(main_commit).expect("find main commit");

        let branch_tree = readme_tree(&repo, Self::BRANCH_README);
        repo.commit(
            Some(&format!("refs/heads/{}", Self::BRANCH)),
            &sig,
            &sig,
            "release",
            &branch_tree,
            &[&main_commit],
        )
        .expect("commit branch");

        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn url(&self) -> String {
        self.path.display().to_string()
    }
}

fn readme_tree<'r>(repo: &'r Repository, contents: &str) -> git2::Tree<'r> {
    let blob = repo.blob(contents.as_bytes()).expect("write blob");
    let mut builder = repo.treebuilder(None).expect("treebuilder");
    builder.insert("README", blob, 0o100644).expect("insert README");
    let tree_id = builder.write().expect("write tree");
    repo.find_tree(tree_id).expect("find tree")
}

/// Presenter, opener and prompt that record every call.
#[derive(Default)]
pub struct RecordingHost {
    answer: Option<String>,
    open_fails: bool,
    journal: Journal,
    progress: RefCell<Vec<ProgressUpdate>>,
    log_lines: RefCell<Vec<String>>,
    replaced: RefCell<Vec<String>>,
    infos: RefCell<Vec<String>>,
    errors: RefCell<Vec<String>>,
    opened: RefCell<Vec<PathBuf>>,
    prompts: Cell<usize>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(mut self, answer: &str) -> Self {
        self.answer = Some(answer.to_string());
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn progress(&self) -> Vec<ProgressUpdate> {
        self.progress.borrow().clone()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log_lines.borrow().clone()
    }

    pub fn replaced_lines(&self) -> Vec<String> {
        self.replaced.borrow().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.borrow().clone()
    }

    pub fn prompts(&self) -> usize {
        self.prompts.get()
    }
}

impl Presenter for RecordingHost {
    fn report_progress(&self, update: &ProgressUpdate) {
        self.progress.borrow_mut().push(update.clone());
    }

    fn log_line(&self, text: &str) {
        self.log_lines.borrow_mut().push(text.to_string());
    }

    fn log_replace(&self, text: &str) {
        self.replaced.borrow_mut().push(text.to_string());
    }

    fn notify_info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn notify_error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}

impl WindowOpener for RecordingHost {
    fn open(&self, dir: &Path) -> io::Result<()> {
        self.journal.borrow_mut().push("open".to_string());
        self.opened.borrow_mut().push(dir.to_path_buf());
        if self.open_fails {
            Err(io::Error::new(io::ErrorKind::NotFound, "editor not found"))
        } else {
            Ok(())
        }
    }
}

impl BranchPrompt for RecordingHost {
    fn ask(&self) -> Option<String> {
        self.prompts.set(self.prompts.get() + 1);
        self.answer.clone()
    }
}

/// Resolver returning a fixed URL, or no origin at all.
pub struct StaticResolver {
    url: Option<String>,
    calls: Cell<usize>,
}

impl StaticResolver {
    pub fn new(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            calls: Cell::new(0),
        }
    }

    pub fn without_origin() -> Self {
        Self {
            url: None,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RemoteResolver for StaticResolver {
    fn resolve(&self, _project: &Path) -> Result<String, GitError> {
        self.calls.set(self.calls.get() + 1);
        self.url
            .clone()
            .ok_or_else(|| GitError::RemoteNotFound("origin".to_string()))
    }
}

/// Real temp directories under a scratch root, with call counting.
pub struct CountingProvisioner {
    root: TempDir,
    inner: TempProvisioner,
    fail_create: bool,
    prefixes: RefCell<Vec<String>>,
    released: RefCell<Vec<PathBuf>>,
}

impl CountingProvisioner {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp directory");
        let inner = TempProvisioner::new(Some(root.path().to_path_buf()));
        Self {
            root,
            inner,
            fail_create: false,
            prefixes: RefCell::new(Vec::new()),
            released: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::new()
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn creates(&self) -> usize {
        self.prefixes.borrow().len()
    }

    pub fn prefixes(&self) -> Vec<String> {
        self.prefixes.borrow().clone()
    }

    pub fn released(&self) -> Vec<PathBuf> {
        self.released.borrow().clone()
    }
}

impl Provisioner for CountingProvisioner {
    fn create(&self, prefix: &str) -> Result<Workspace, WorkspaceError> {
        self.prefixes.borrow_mut().push(prefix.to_string());
        if self.fail_create {
            return Err(WorkspaceError::Create(io::Error::new(
                io::ErrorKind::StorageFull,
                "no space left on device",
            )));
        }
        self.inner.create(prefix)
    }

    fn release(&self, workspace: Workspace) -> Result<(), WorkspaceError> {
        self.released
            .borrow_mut()
            .push(workspace.path().to_path_buf());
        workspace.release()
    }
}

/// What a scripted stage does.
pub enum Step {
    Succeed {
        events: Vec<ProgressEvent>,
        output: String,
    },
    Fail(String),
    /// Keeps the event channel open until the runner gives up.
    HangUntilCancelled,
}

/// Repository client that follows a per-stage script.
///
/// Stages without a script succeed silently.
#[derive(Default)]
pub struct ScriptedClient {
    steps: HashMap<Stage, Step>,
    cancel_on_start: Option<(Stage, CancellationToken)>,
    journal: Journal,
    started: RefCell<Vec<StageOperation>>,
    aborted: Rc<RefCell<Vec<Stage>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: Stage, step: Step) -> Self {
        self.steps.insert(stage, step);
        self
    }

    /// Signal `token` as soon as `stage` starts, like a user pressing cancel.
    pub fn cancel_on_start(mut self, stage: Stage, token: CancellationToken) -> Self {
        self.cancel_on_start = Some((stage, token));
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn started(&self) -> Vec<StageOperation> {
        self.started.borrow().clone()
    }

    pub fn started_stages(&self) -> Vec<Stage> {
        self.started.borrow().iter().map(StageOperation::stage).collect()
    }

    pub fn aborted(&self) -> Vec<Stage> {
        self.aborted.borrow().clone()
    }
}

impl RepoClient for ScriptedClient {
    fn start(&self, operation: &StageOperation) -> Result<Box<dyn RunningOperation>, GitError> {
        let stage = operation.stage();
        self.started.borrow_mut().push(operation.clone());
        self.journal.borrow_mut().push(stage.name().to_string());

        if let Some((cancel_stage, token)) = &self.cancel_on_start {
            if *cancel_stage == stage {
                token.cancel();
            }
        }

        let (sender, events) = unbounded();
        let mut op = ScriptedOperation {
            stage,
            events,
            sender: None,
            outcome: Some(Ok(String::new())),
            aborted: Rc::clone(&self.aborted),
        };

        match self.steps.get(&stage) {
            None => {}
            Some(Step::Succeed { events, output }) => {
                for event in events {
                    sender.send(event.clone()).expect("send scripted event");
                }
                op.outcome = Some(Ok(output.clone()));
            }
            Some(Step::Fail(message)) => {
                let message = message.clone();
                op.outcome = Some(Err(match stage {
                    Stage::Clone => GitError::CloneError(message),
                    Stage::Fetch => GitError::FetchError(message),
                    Stage::Checkout => GitError::CheckoutError(message),
                }));
            }
            Some(Step::HangUntilCancelled) => op.sender = Some(sender.clone()),
        }

        Ok(Box::new(op))
    }
}

struct ScriptedOperation {
    stage: Stage,
    events: Receiver<ProgressEvent>,
    sender: Option<Sender<ProgressEvent>>,
    outcome: Option<Result<String, GitError>>,
    aborted: Rc<RefCell<Vec<Stage>>>,
}

impl RunningOperation for ScriptedOperation {
    fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    fn abort(&mut self) -> Result<(), GitError> {
        self.aborted.borrow_mut().push(self.stage);
        self.sender = None;
        Ok(())
    }

    fn wait(mut self: Box<Self>) -> Result<String, GitError> {
        self.outcome.take().unwrap_or_else(|| Ok(String::new()))
    }
}
