//! Caller-facing summary of a pipeline run.

use super::{PipelineOutcome, PipelineRun, StepStatus};

/// Output captured from the step that stopped a pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostics {
    /// 1-based step number.
    pub step: usize,
    /// Step name.
    pub name: String,
    /// Partial standard output of the step.
    pub stdout: String,
    /// Standard error of the step, or the transport error.
    pub stderr: String,
}

/// Outcome of a pipeline with its payload or diagnostics.
///
/// The payload is only present on success, so partial output from a failed
/// run can never be mistaken for a valid result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionResult {
    outcome: PipelineOutcome,
    payload: Option<String>,
    diagnostics: Option<Diagnostics>,
}

impl ExecutionResult {
    pub(super) fn from_run(run: &PipelineRun) -> Self {
        let outcome = run.outcome().clone();
        match outcome {
            PipelineOutcome::Success => Self {
                payload: run.records().last().map(|record| record.stdout.clone()),
                diagnostics: None,
                outcome,
            },
            PipelineOutcome::FailedAtStep { step, .. } | PipelineOutcome::Aborted { step } => {
                let diagnostics = run
                    .records()
                    .get(step.saturating_sub(1))
                    .filter(|record| {
                        matches!(record.status, StepStatus::Failed | StepStatus::Aborted)
                    })
                    .map(|record| Diagnostics {
                        step,
                        name: record.name.clone(),
                        stdout: record.stdout.clone(),
                        stderr: record.stderr.clone(),
                    });
                Self {
                    outcome,
                    payload: None,
                    diagnostics,
                }
            }
        }
    }

    /// Overall outcome.
    #[must_use]
    pub const fn outcome(&self) -> &PipelineOutcome {
        &self.outcome
    }

    /// Returns `true` only when every step succeeded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Success)
    }

    /// Standard output of the final step, present only on success.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// 1-based number of the step that stopped the run.
    #[must_use]
    pub const fn failed_step(&self) -> Option<usize> {
        match self.outcome {
            PipelineOutcome::Success => None,
            PipelineOutcome::FailedAtStep { step, .. } | PipelineOutcome::Aborted { step } => {
                Some(step)
            }
        }
    }

    /// Output captured from the failing or aborted step.
    #[must_use]
    pub const fn diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }
}
