//! Git CLI wrapper with security hardening.
//!
//! Every stage is spawned with `--progress` so git reports percentages on
//! stderr even when it is not attached to a terminal. A reader thread turns
//! that stream into [`ProgressEvent`]s while the stage runs.

use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::GitError;
use super::progress::{parse_progress, split_segments};
use crate::stage::{ProgressEvent, RepoClient, RunningOperation, Stage, StageOperation};

/// Git CLI wrapper with security hardening.
pub struct GitCli {
    git_path: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Create a new GitCli instance using the system git.
    pub fn new() -> Self {
        Self::with_path("git")
    }

    /// Use a specific git executable.
    pub fn with_path(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    /// Create a hardened Command with security settings.
    ///
    /// Applies:
    /// - `GIT_TERMINAL_PROMPT=0` - disable interactive prompts
    /// - `core.hooksPath=` - disable hooks execution
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.args(["-c", "core.hooksPath="]);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Build the command line for one stage.
    ///
    /// `--end-of-options` keeps a URL or branch that starts with `-` from
    /// being parsed as a flag.
    fn stage_command(&self, operation: &StageOperation) -> Command {
        let mut cmd = self.command();
        match operation {
            StageOperation::Clone { url, dest } => {
                cmd.args(["clone", "--progress", "--end-of-options"])
                    .arg(url)
                    .arg(dest);
            }
            StageOperation::Fetch { repo } => {
                cmd.arg("-C").arg(repo).args(["fetch", "--progress"]);
            }
            StageOperation::Checkout { repo, branch } => {
                cmd.arg("-C")
                    .arg(repo)
                    .args(["checkout", "--progress", "--end-of-options"])
                    .arg(branch);
            }
        }
        cmd
    }

    /// Spawn one stage and start streaming its progress.
    pub fn spawn(&self, operation: &StageOperation) -> Result<GitOperation, GitError> {
        let stage = operation.stage();
        let mut cmd = self.stage_command(operation);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        // Own process group: a terminal Ctrl-C reaches only cmpbranch, and
        // abort can stop transport helpers along with git.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        log::debug!("Spawning {:?}", cmd);

        let mut child = cmd.spawn()?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| GitError::ParseError("git stderr was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GitError::ParseError("git stdout was not captured".to_string()))?;

        let (sender, events) = unbounded();
        let stderr_reader = thread::Builder::new()
            .name(format!("git-{}-stderr", stage))
            .spawn(move || read_stderr(stage, stderr, sender))?;
        let stdout_reader = thread::Builder::new()
            .name(format!("git-{}-stdout", stage))
            .spawn(move || read_stdout(stdout))?;

        Ok(GitOperation {
            stage,
            child,
            events,
            stderr_reader: Some(stderr_reader),
            stdout_reader: Some(stdout_reader),
            finished: false,
        })
    }
}

impl RepoClient for GitCli {
    fn start(&self, operation: &StageOperation) -> Result<Box<dyn RunningOperation>, GitError> {
        Ok(Box::new(self.spawn(operation)?))
    }
}

/// Forward progress lines as events and collect everything else.
fn read_stderr(stage: Stage, mut stderr: ChildStderr, sender: Sender<ProgressEvent>) -> String {
    let mut diagnostics = Vec::new();
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match stderr.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Reading git {} stderr failed: {}", stage, e);
                break;
            }
        };
        for segment in split_segments(&mut pending, &chunk[..n]) {
            match parse_progress(stage.name(), &segment) {
                // The receiver is gone once the stage was aborted.
                Some(event) => {
                    let _ = sender.send(event);
                }
                None => diagnostics.push(segment),
            }
        }
    }

    let tail = String::from_utf8_lossy(&pending);
    if !tail.trim().is_empty() {
        diagnostics.push(tail.into_owned());
    }
    diagnostics.join("\n")
}

fn read_stdout(mut stdout: ChildStdout) -> String {
    let mut output = Vec::new();
    if let Err(e) = stdout.read_to_end(&mut output) {
        log::warn!("Reading git stdout failed: {}", e);
    }
    String::from_utf8_lossy(&output).into_owned()
}

/// A git stage running as a child process.
///
/// Dropping an operation that has not finished kills the child.
pub struct GitOperation {
    stage: Stage,
    child: Child,
    events: Receiver<ProgressEvent>,
    stderr_reader: Option<JoinHandle<String>>,
    stdout_reader: Option<JoinHandle<String>>,
    finished: bool,
}

impl GitOperation {
    fn failure(&self, message: String) -> GitError {
        match self.stage {
            Stage::Clone => GitError::CloneError(message),
            Stage::Fetch => GitError::FetchError(message),
            Stage::Checkout => GitError::CheckoutError(message),
        }
    }

    fn kill(&mut self) -> Result<(), GitError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        kill_process_group(&mut self.child)?;
        self.child.wait()?;
        Ok(())
    }
}

/// Kill git and every helper it started (`git-remote-https`, `index-pack`,
/// ssh). The group still exists while the unreaped child is a zombie.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only sends a signal to the group created in `spawn`.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    match child.kill() {
        // Already exited.
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

impl RunningOperation for GitOperation {
    fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    fn abort(&mut self) -> Result<(), GitError> {
        log::debug!("Killing git {} (pid {})", self.stage, self.child.id());
        // Reader threads are left to finish on their own; a helper process
        // such as ssh may hold the pipes open a little longer.
        self.stderr_reader = None;
        self.stdout_reader = None;
        self.kill()
    }

    fn wait(mut self: Box<Self>) -> Result<String, GitError> {
        let status = self.child.wait()?;
        self.finished = true;

        let diagnostics = self
            .stderr_reader
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();
        let stdout = self
            .stdout_reader
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        let mut text = stdout.trim_end().to_string();
        if !diagnostics.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&diagnostics);
        }

        if status.success() {
            Ok(text)
        } else {
            log::debug!("git {} exited with {}", self.stage, status);
            Err(self.failure(text))
        }
    }
}

impl Drop for GitOperation {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            log::warn!("Failed to stop git {}: {}", self.stage, e);
        }
    }
}

/// Check whether the configured git executable can be run.
pub fn git_available(git_path: &str) -> bool {
    Command::new(git_path)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
