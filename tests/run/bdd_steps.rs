//! BDD step definitions for the benchmark run.

use benchferry::backend::{HealthStatus, StatusSnapshot};
use benchferry::test_support::ScriptedBackendError;
use benchferry::{LifecycleManager, ReadinessPoller, RunError, RunOrchestrator, SshConnector};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{
    FailureKind, RunContext, RunFailure, RunResult, STEP_COUNT, pipeline, policy,
    session_config, spec,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to build the run: {0}")]
    Setup(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a resource that becomes ready after \"{checks}\" status checks")]
fn ready_after(run_context: RunContext, checks: usize) -> RunContext {
    run_context.backend.push_not_ready(checks.saturating_sub(1));
    run_context
}

#[given("a readiness limit of \"{attempts}\" status checks")]
fn readiness_limit(mut run_context: RunContext, attempts: u32) -> RunContext {
    run_context.max_attempts = attempts;
    run_context
}

#[given("a resource that never becomes ready")]
fn never_ready(run_context: RunContext) -> RunContext {
    run_context
        .backend
        .set_fallback_status(Some(StatusSnapshot::new(
            HealthStatus::Ok,
            HealthStatus::Initializing,
        )));
    run_context
}

#[given("every pipeline step succeeds with report \"{report}\"")]
fn every_step_succeeds(run_context: RunContext, report: String) -> RunContext {
    run_context.runner.push_success();
    for _ in 1..STEP_COUNT {
        run_context.runner.push_success();
    }
    run_context.runner.push_stdout(report);
    run_context
}

#[given("step \"{step}\" exits with code \"{code}\"")]
fn step_fails(run_context: RunContext, step: usize, code: i32) -> RunContext {
    run_context.runner.push_success();
    for _ in 1..step {
        run_context.runner.push_success();
    }
    run_context
        .runner
        .push_output(Some(code), "partial", "make: *** [all] Error 2");
    run_context
}

#[when("I run the five step benchmark pipeline")]
fn run_pipeline(run_context: RunContext) -> Result<RunContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Setup(err.to_string()))?;
    let lifecycle = LifecycleManager::new(
        run_context.backend.clone(),
        ReadinessPoller::new(policy(run_context.max_attempts)),
    );
    let connector = SshConnector::new(session_config(), run_context.runner.clone())
        .map_err(|err| StepError::Setup(err.to_string()))?;
    let orchestrator = RunOrchestrator::new(lifecycle, connector);

    let result = runtime.block_on(async {
        orchestrator
            .execute(&spec(), &pipeline(), &CancellationToken::new())
            .await
    });

    let outcome = match result {
        Ok(execution) => RunResult::Success(execution),
        Err(err) => RunResult::Failure(describe_failure(&err)),
    };
    Ok(RunContext {
        outcome: Some(outcome),
        ..run_context
    })
}

fn describe_failure(err: &RunError<ScriptedBackendError>) -> RunFailure {
    let kind = match err {
        RunError::ReadinessTimeout(_) => FailureKind::ReadinessTimeout,
        RunError::RemoteCommand {
            step, exit_code, ..
        } => FailureKind::RemoteCommand {
            step: *step,
            exit_code: *exit_code,
        },
        _ => FailureKind::Other,
    };
    RunFailure {
        message: err.to_string(),
        state: err.failed_state(),
        kind,
    }
}

fn failure(run_context: &RunContext) -> Result<&RunFailure, StepError> {
    match &run_context.outcome {
        Some(RunResult::Failure(failure)) => Ok(failure),
        Some(RunResult::Success(result)) => Err(StepError::Assertion(format!(
            "expected a failed run, got {:?}",
            result.outcome()
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the run succeeds with report \"{report}\"")]
fn run_succeeds(run_context: &RunContext, report: String) -> Result<(), StepError> {
    match &run_context.outcome {
        Some(RunResult::Success(result)) if result.payload() == Some(report.as_str()) => Ok(()),
        Some(RunResult::Success(result)) => Err(StepError::Assertion(format!(
            "expected report {report:?}, got {:?}",
            result.payload()
        ))),
        Some(RunResult::Failure(failure)) => Err(StepError::Assertion(format!(
            "run failed unexpectedly: {}",
            failure.message
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the run fails at step \"{step}\" with exit code \"{code}\"")]
fn run_fails_at_step(run_context: &RunContext, step: usize, code: i32) -> Result<(), StepError> {
    let observed = failure(run_context)?;
    let expected = FailureKind::RemoteCommand {
        step,
        exit_code: Some(code),
    };
    if observed.kind == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected:?}, got {:?} ({})",
            observed.kind, observed.message
        )))
    }
}

#[then("the run fails with a readiness timeout")]
fn run_times_out(run_context: &RunContext) -> Result<(), StepError> {
    let observed = failure(run_context)?;
    if observed.kind == FailureKind::ReadinessTimeout
        && observed.state == benchferry::RunState::AwaitingReady
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a readiness timeout, got {}",
            observed.message
        )))
    }
}

#[then("\"{count}\" remote steps ran")]
fn remote_steps_ran(run_context: &RunContext, count: usize) -> Result<(), StepError> {
    let steps = run_context.remote_steps();
    let expected: Vec<String> = (1..=count).map(|index| format!("step-{index}")).collect();
    if steps == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected remote steps {expected:?}, got {steps:?}"
        )))
    }
}

#[then("the backend was queried \"{count}\" times")]
fn backend_queried(run_context: &RunContext, count: u32) -> Result<(), StepError> {
    let calls = run_context.backend.status_calls();
    if calls == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} status checks, got {calls}"
        )))
    }
}

#[then("the resource is terminated exactly once")]
fn terminated_once(run_context: &RunContext) -> Result<(), StepError> {
    let calls = run_context.backend.terminate_calls();
    if calls == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected one terminate call, got {calls}"
        )))
    }
}
