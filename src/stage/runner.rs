//! Runs one stage against the repository client.
//!
//! The runner drains the operation's progress channel until the client
//! closes it, then resolves the operation once. Between events it polls the
//! cancellation token and aborts the in-flight operation when it is set.

use std::collections::HashMap;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;

use super::{
    CancellationToken, ProgressEvent, ProgressUpdate, RepoClient, RunningOperation, Stage,
    StageDescriptor,
};
use crate::git::GitError;
use crate::workflow::Presenter;

/// How long to wait for a progress event before re-checking cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a stage did not complete.
#[derive(Error, Debug)]
pub enum StageError {
    /// The client reported a failure.
    #[error("{source}")]
    Failed {
        stage: Stage,
        #[source]
        source: GitError,
    },
    /// The cancellation token was signaled.
    #[error("{stage} cancelled by user")]
    Cancelled { stage: Stage },
}

/// Executes stages, forwarding progress to the presenter.
pub struct StageRunner<'a> {
    client: &'a dyn RepoClient,
    presenter: &'a dyn Presenter,
    token: &'a CancellationToken,
}

impl<'a> StageRunner<'a> {
    pub fn new(
        client: &'a dyn RepoClient,
        presenter: &'a dyn Presenter,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            presenter,
            token,
        }
    }

    /// Run one stage to completion, failure or cancellation.
    pub fn run(&self, descriptor: &StageDescriptor) -> Result<(), StageError> {
        let stage = descriptor.stage();
        if self.token.is_cancelled() {
            return Err(StageError::Cancelled { stage });
        }

        log::info!(
            "Starting {} in {}",
            descriptor.name,
            descriptor.operation.target().display()
        );
        let mut operation = self
            .client
            .start(&descriptor.operation)
            .map_err(|source| StageError::Failed { stage, source })?;

        let mut tracker = ProgressTracker::default();
        loop {
            if self.token.is_cancelled() {
                return Err(self.cancel(operation.as_mut(), stage));
            }

            match operation.events().recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    let update = tracker.normalize(descriptor, &event);
                    self.presenter.report_progress(&update);
                    self.presenter
                        .log_replace(&format!("{}: {}%", update.label, update.percent));
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // The signal that set the token may also have ended the operation.
        if self.token.is_cancelled() {
            return Err(self.cancel(operation.as_mut(), stage));
        }

        let output = match operation.wait() {
            Ok(output) => output,
            Err(e) if self.token.is_cancelled() => {
                log::debug!("{} ended after cancellation: {}", stage, e);
                return Err(StageError::Cancelled { stage });
            }
            Err(source) => return Err(StageError::Failed { stage, source }),
        };
        if !output.trim().is_empty() {
            self.presenter.log_line(output.trim_end());
        }

        log::info!("Finished {}", stage);
        Ok(())
    }

    fn cancel(&self, operation: &mut dyn RunningOperation, stage: Stage) -> StageError {
        log::info!("{} cancelled, aborting the running operation", stage);
        if let Err(e) = operation.abort() {
            log::warn!("Failed to abort {}: {}", stage, e);
        }
        StageError::Cancelled { stage }
    }
}

/// Turns absolute percentages into increments per (method, phase).
#[derive(Debug, Default)]
struct ProgressTracker {
    last: HashMap<(String, String), u8>,
}

impl ProgressTracker {
    fn normalize(
        &mut self,
        descriptor: &StageDescriptor,
        event: &ProgressEvent,
    ) -> ProgressUpdate {
        let previous = self
            .last
            .insert((event.method.clone(), event.phase.clone()), event.percent)
            .unwrap_or(0);

        ProgressUpdate {
            label: format!("{} {} {}", descriptor.label_prefix, event.method, event.phase),
            percent: event.percent,
            increment: event.percent.saturating_sub(previous),
        }
    }
}
