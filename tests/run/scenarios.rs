//! BDD scenarios for the benchmark run.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RunContext, run_context};

#[scenario(
    path = "tests/features/run.feature",
    name = "Report the final step output once the resource is ready"
)]
fn scenario_report_final_output(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Stop at the failing step and still tear down"
)]
fn scenario_stop_at_failing_step(run_context: RunContext) {
    drop(run_context);
}

#[scenario(
    path = "tests/features/run.feature",
    name = "Give up when the resource never becomes ready"
)]
fn scenario_readiness_timeout(run_context: RunContext) {
    drop(run_context);
}
