//! Test doubles shared across unit and integration tests.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::backend::{
    Backend, BackendFuture, HealthStatus, InstanceHandle, ResourceDetails, ResourceSpec,
    StatusSnapshot,
};
use crate::session::{CommandOutput, CommandRunner, RunnerFuture, SessionError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the final argument, which is the remote command for SSH
    /// client invocations.
    #[must_use]
    pub fn last_arg(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

#[derive(Clone, Debug)]
enum ScriptedResponse {
    Output(CommandOutput),
    Error(SessionError),
    Hang,
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes a response with no exit code to simulate abnormal termination.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(ScriptedResponse::Output(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }));
    }

    /// Pushes an error returned instead of an output.
    pub fn push_error(&self, error: SessionError) {
        lock(&self.responses).push_back(ScriptedResponse::Error(error));
    }

    /// Pushes a response that never completes, for cancellation tests.
    pub fn push_hang(&self) {
        lock(&self.responses).push_back(ScriptedResponse::Hang);
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> RunnerFuture<'a> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        let response = lock(&self.responses).pop_front();
        Box::pin(async move {
            match response {
                Some(ScriptedResponse::Output(output)) => Ok(output),
                Some(ScriptedResponse::Error(err)) => Err(err),
                Some(ScriptedResponse::Hang) => std::future::pending().await,
                None => Err(SessionError::Spawn {
                    program: program.to_owned(),
                    message: String::from("no scripted response available"),
                }),
            }
        })
    }
}

/// Errors raised by [`ScriptedBackend`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedBackendError {
    /// Scripted create failure.
    #[error("create rejected: quota exceeded")]
    Create,
    /// Scripted status query failure.
    #[error("status query failure")]
    Status,
    /// Scripted terminate failure.
    #[error("terminate failure")]
    Terminate,
}

#[derive(Debug)]
struct BackendState {
    fail_on_create: bool,
    fail_on_status: bool,
    fail_on_terminate: bool,
    hang_on_status: bool,
    hang_on_terminate: bool,
    statuses: VecDeque<Option<StatusSnapshot>>,
    fallback_status: Option<StatusSnapshot>,
    public_ip: Option<IpAddr>,
    create_calls: u32,
    status_calls: u32,
    terminate_calls: u32,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            fail_on_create: false,
            fail_on_status: false,
            fail_on_terminate: false,
            hang_on_status: false,
            hang_on_terminate: false,
            statuses: VecDeque::new(),
            fallback_status: Some(StatusSnapshot::new(HealthStatus::Ok, HealthStatus::Ok)),
            public_ip: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            create_calls: 0,
            status_calls: 0,
            terminate_calls: 0,
        }
    }
}

/// Scripted backend that replays status snapshots and counts calls.
///
/// Queued snapshots are returned in order; once the queue is empty every
/// status query returns the fallback (ready by default).
#[derive(Clone, Debug, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    /// Creates a backend whose resources are ready immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a status response.
    pub fn push_status(&self, status: Option<StatusSnapshot>) {
        lock(&self.state).statuses.push_back(status);
    }

    /// Queues `count` snapshots reporting the instance up but the system
    /// checks still initialising.
    pub fn push_not_ready(&self, count: usize) {
        let mut state = lock(&self.state);
        for _ in 0..count {
            state.statuses.push_back(Some(StatusSnapshot::new(
                HealthStatus::Ok,
                HealthStatus::Initializing,
            )));
        }
    }

    /// Sets the response used once the queue is exhausted.
    pub fn set_fallback_status(&self, status: Option<StatusSnapshot>) {
        lock(&self.state).fallback_status = status;
    }

    /// Makes `create` fail.
    pub fn fail_on_create(&self) {
        lock(&self.state).fail_on_create = true;
    }

    /// Makes `describe_status` fail.
    pub fn fail_on_status(&self) {
        lock(&self.state).fail_on_status = true;
    }

    /// Makes `describe_status` never complete.
    pub fn hang_on_status(&self) {
        lock(&self.state).hang_on_status = true;
    }

    /// Makes `terminate` never complete.
    pub fn hang_on_terminate(&self) {
        lock(&self.state).hang_on_terminate = true;
    }

    /// Makes `terminate` fail.
    pub fn fail_on_terminate(&self) {
        lock(&self.state).fail_on_terminate = true;
    }

    /// Removes the public address reported by `describe_details`.
    pub fn without_public_ip(&self) {
        lock(&self.state).public_ip = None;
    }

    /// Number of `create` calls.
    #[must_use]
    pub fn create_calls(&self) -> u32 {
        lock(&self.state).create_calls
    }

    /// Number of `describe_status` calls.
    #[must_use]
    pub fn status_calls(&self) -> u32 {
        lock(&self.state).status_calls
    }

    /// Number of `terminate` calls.
    #[must_use]
    pub fn terminate_calls(&self) -> u32 {
        lock(&self.state).terminate_calls
    }
}

impl Backend for ScriptedBackend {
    type Error = ScriptedBackendError;

    fn create<'a>(
        &'a self,
        _spec: &'a ResourceSpec,
    ) -> BackendFuture<'a, InstanceHandle, Self::Error> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.create_calls += 1;
            if state.fail_on_create {
                return Err(ScriptedBackendError::Create);
            }
            Ok(InstanceHandle {
                id: String::from("scripted-id"),
                zone: String::from("test-zone"),
            })
        })
    }

    fn describe_status<'a>(
        &'a self,
        _handle: &'a InstanceHandle,
    ) -> BackendFuture<'a, Option<StatusSnapshot>, Self::Error> {
        Box::pin(async move {
            let (hang, result) = {
                let mut state = lock(&self.state);
                state.status_calls += 1;
                let result = if state.fail_on_status {
                    Err(ScriptedBackendError::Status)
                } else {
                    let fallback = state.fallback_status;
                    Ok(state.statuses.pop_front().unwrap_or(fallback))
                };
                (state.hang_on_status, result)
            };
            if hang {
                std::future::pending::<()>().await;
            }
            result
        })
    }

    fn describe_details<'a>(
        &'a self,
        _handle: &'a InstanceHandle,
    ) -> BackendFuture<'a, ResourceDetails, Self::Error> {
        Box::pin(async move {
            Ok(ResourceDetails {
                public_ip: lock(&self.state).public_ip,
                ssh_port: 22,
            })
        })
    }

    fn terminate<'a>(&'a self, _handle: &'a InstanceHandle) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let (hang, fail) = {
                let mut state = lock(&self.state);
                state.terminate_calls += 1;
                (state.hang_on_terminate, state.fail_on_terminate)
            };
            if hang {
                std::future::pending::<()>().await;
            }
            if fail {
                return Err(ScriptedBackendError::Terminate);
            }
            Ok(())
        })
    }
}
