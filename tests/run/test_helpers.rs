//! Shared fixtures for the benchmark run scenarios.

use std::time::Duration;

use benchferry::session::SessionConfig;
use benchferry::test_support::{ScriptedBackend, ScriptedRunner};
use benchferry::{
    ExecutionPipeline, ExecutionResult, PipelineStep, ReadinessPolicy, ResourceSpec, RunState,
};
use rstest::fixture;

pub const STEP_COUNT: usize = 5;

#[derive(Clone, Debug)]
pub struct RunContext {
    pub backend: ScriptedBackend,
    pub runner: ScriptedRunner,
    pub max_attempts: u32,
    pub outcome: Option<RunResult>,
}

#[derive(Clone, Debug)]
pub enum RunResult {
    Success(ExecutionResult),
    Failure(RunFailure),
}

#[derive(Clone, Debug)]
pub struct RunFailure {
    pub message: String,
    pub state: RunState,
    pub kind: FailureKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureKind {
    ReadinessTimeout,
    RemoteCommand {
        step: usize,
        exit_code: Option<i32>,
    },
    Other,
}

#[fixture]
pub fn run_context() -> RunContext {
    RunContext {
        backend: ScriptedBackend::new(),
        runner: ScriptedRunner::new(),
        max_attempts: 10,
        outcome: None,
    }
}

impl RunContext {
    /// Remote pipeline commands seen by the runner, without the handshake.
    pub fn remote_steps(&self) -> Vec<String> {
        self.runner
            .invocations()
            .iter()
            .filter_map(benchferry::test_support::CommandInvocation::last_arg)
            .filter(|command| command.starts_with("step-"))
            .collect()
    }
}

pub fn policy(max_attempts: u32) -> ReadinessPolicy {
    ReadinessPolicy {
        pending_delay: Duration::from_millis(1),
        retry_delay: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
        max_attempts: Some(max_attempts),
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        ssh_bin: String::from("ssh"),
        ssh_user: String::from("ubuntu"),
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
        ssh_identity_file: Some(String::from("/keys/bench.pem")),
        control_dir: String::from("/tmp"),
        control_persist_secs: 60,
        connect_timeout_secs: 10,
        connect_attempts: 1,
        connect_retry_delay_secs: 0,
    }
}

pub fn spec() -> ResourceSpec {
    ResourceSpec::builder()
        .image_label("Ubuntu 22.04 Jammy Jellyfish")
        .machine_class("POP2-HC-16C-32G")
        .zone("fr-par-2")
        .project_id("project")
        .architecture("x86_64")
        .storage(200, "sbs_volume")
        .build()
        .unwrap_or_else(|err| panic!("spec fixture should be valid: {err}"))
}

pub fn pipeline() -> ExecutionPipeline {
    ExecutionPipeline::new(
        (1..=STEP_COUNT)
            .map(|index| PipelineStep::new(format!("step-{index}"), format!("step-{index}")))
            .collect(),
    )
    .unwrap_or_else(|err| panic!("pipeline fixture should be valid: {err}"))
}
