//! Ordered remote steps executed over a single session.
//!
//! Each [`PipelineStep`] runs only after the previous one exited with its
//! expected status. The first failure stops the pipeline; its captured output
//! is kept as the diagnostic payload and later steps are recorded as skipped.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::session::{CommandRunner, RemoteCommandOutput, SessionError, SshSession};

mod result;

pub use result::{Diagnostics, ExecutionResult};

/// A named remote command with an expected exit status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineStep {
    name: String,
    command: String,
    expected_exit: i32,
}

impl PipelineStep {
    /// Creates a step that succeeds on exit status zero.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            expected_exit: 0,
        }
    }

    /// Overrides the exit status treated as success.
    #[must_use]
    pub const fn expecting_exit(mut self, code: i32) -> Self {
        self.expected_exit = code;
        self
    }

    /// Step name used in logs and reports.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote shell command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns `true` when `exit_code` satisfies the step.
    #[must_use]
    pub const fn accepts(&self, exit_code: i32) -> bool {
        exit_code == self.expected_exit
    }
}

/// Progress of one step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepStatus {
    /// Not started.
    Pending,
    /// Exited with the expected status.
    Succeeded,
    /// Exited with another status or could not be run.
    Failed,
    /// Not run because an earlier step failed.
    Skipped,
    /// Interrupted by cancellation.
    Aborted,
}

/// Execution record of one step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepRecord {
    /// Step name.
    pub name: String,
    /// Final status.
    pub status: StepStatus,
    /// Remote exit status, when the command terminated normally.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error, or the transport error.
    pub stderr: String,
    /// Wall-clock time spent on the step.
    pub duration: Duration,
}

/// Overall result of a pipeline run. Step numbers are 1-based.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PipelineOutcome {
    /// Every step succeeded.
    Success,
    /// A step failed; later steps were skipped.
    FailedAtStep {
        /// Failing step number.
        step: usize,
        /// Failing step name.
        name: String,
        /// Exit status, absent when the command never produced one.
        exit_code: Option<i32>,
    },
    /// The run was cancelled while `step` was pending or running.
    Aborted {
        /// Interrupted step number.
        step: usize,
    },
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::FailedAtStep {
                step,
                name,
                exit_code: Some(code),
            } => write!(f, "failed at step {step} ({name}) with exit status {code}"),
            Self::FailedAtStep { step, name, .. } => {
                write!(f, "failed at step {step} ({name}) without an exit status")
            }
            Self::Aborted { step } => write!(f, "aborted at step {step}"),
        }
    }
}

/// Execution record of a whole pipeline.
///
/// Only [`ExecutionPipeline::run`] mutates a record; callers receive it
/// finalised.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineRun {
    records: Vec<StepRecord>,
    current: usize,
    outcome: PipelineOutcome,
}

impl PipelineRun {
    fn new(steps: &[PipelineStep]) -> Self {
        Self {
            records: steps
                .iter()
                .map(|step| StepRecord {
                    name: step.name().to_owned(),
                    status: StepStatus::Pending,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::ZERO,
                })
                .collect(),
            current: 0,
            outcome: PipelineOutcome::Success,
        }
    }

    /// Per-step records in declared order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Zero-based index of the last step that was started.
    #[must_use]
    pub const fn current_step(&self) -> usize {
        self.current
    }

    /// Overall outcome.
    #[must_use]
    pub const fn outcome(&self) -> &PipelineOutcome {
        &self.outcome
    }

    /// Returns `true` when every step succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Success)
    }

    /// Builds the caller-facing result.
    #[must_use]
    pub fn result(&self) -> ExecutionResult {
        ExecutionResult::from_run(self)
    }

    fn record_output(
        &mut self,
        index: usize,
        output: RemoteCommandOutput,
        status: StepStatus,
        duration: Duration,
    ) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = status;
            record.exit_code = Some(output.exit_code);
            record.stdout = output.stdout;
            record.stderr = output.stderr;
            record.duration = duration;
        }
    }

    fn record_error(&mut self, index: usize, error: &SessionError, duration: Duration) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::Failed;
            record.stderr = error.to_string();
            record.duration = duration;
        }
    }

    fn finish(&mut self, index: usize, outcome: PipelineOutcome) {
        if let PipelineOutcome::Aborted { .. } = outcome
            && let Some(record) = self.records.get_mut(index)
        {
            record.status = StepStatus::Aborted;
        }
        for record in self.records.iter_mut().skip(index.saturating_add(1)) {
            record.status = StepStatus::Skipped;
        }
        self.outcome = outcome;
    }
}

/// Errors raised when assembling a pipeline.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PipelineError {
    /// Raised when no steps are supplied.
    #[error("pipeline has no steps")]
    Empty,
    /// Raised when two steps share a name.
    #[error("duplicate pipeline step name: {0}")]
    DuplicateStep(String),
    /// Raised when a step has a blank name or command.
    #[error("pipeline step {0} has an empty name or command")]
    BlankStep(usize),
}

/// A validated, strictly ordered list of steps.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionPipeline {
    steps: Vec<PipelineStep>,
}

impl ExecutionPipeline {
    /// Validates and wraps `steps`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the list is empty, a step is blank, or
    /// names repeat.
    pub fn new(steps: Vec<PipelineStep>) -> Result<Self, PipelineError> {
        if steps.is_empty() {
            return Err(PipelineError::Empty);
        }
        let mut seen = BTreeSet::new();
        for (index, step) in steps.iter().enumerate() {
            if step.name.trim().is_empty() || step.command.trim().is_empty() {
                return Err(PipelineError::BlankStep(index + 1));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::DuplicateStep(step.name.clone()));
            }
        }
        Ok(Self { steps })
    }

    /// The steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Runs every step over `session`, stopping at the first failure or when
    /// `cancel` fires. A cancelled step has its client process dropped, which
    /// stops the remote command's SSH channel.
    pub async fn run<R: CommandRunner>(
        &self,
        session: &SshSession<'_, R>,
        cancel: &CancellationToken,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(&self.steps);

        for (index, step) in self.steps.iter().enumerate() {
            run.current = index;
            let position = index + 1;
            let started = Instant::now();
            info!(step = position, name = step.name(), "starting pipeline step");

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(step = position, name = step.name(), "pipeline cancelled");
                    if let Some(record) = run.records.get_mut(index) {
                        record.duration = started.elapsed();
                    }
                    run.finish(index, PipelineOutcome::Aborted { step: position });
                    return run;
                }
                output = session.execute(step.command()) => output,
            };

            match result {
                Ok(output) if step.accepts(output.exit_code) => {
                    info!(
                        step = position,
                        name = step.name(),
                        exit_code = output.exit_code,
                        elapsed_secs = started.elapsed().as_secs(),
                        "pipeline step finished"
                    );
                    run.record_output(index, output, StepStatus::Succeeded, started.elapsed());
                }
                Ok(output) => {
                    let exit_code = output.exit_code;
                    warn!(step = position, name = step.name(), exit_code, "pipeline step failed");
                    run.record_output(index, output, StepStatus::Failed, started.elapsed());
                    run.finish(
                        index,
                        PipelineOutcome::FailedAtStep {
                            step: position,
                            name: step.name().to_owned(),
                            exit_code: Some(exit_code),
                        },
                    );
                    return run;
                }
                Err(err) => {
                    warn!(step = position, name = step.name(), error = %err, "pipeline step could not run");
                    run.record_error(index, &err, started.elapsed());
                    run.finish(
                        index,
                        PipelineOutcome::FailedAtStep {
                            step: position,
                            name: step.name().to_owned(),
                            exit_code: None,
                        },
                    );
                    return run;
                }
            }
        }

        run
    }
}
