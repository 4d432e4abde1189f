//! Binary entry point for the `benchferry` CLI.

mod cli;

use std::future;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use benchferry::{
    BenchmarkError, BenchmarkOptions, BenchmarkPlan, FileError, LifecycleManager,
    PlacementOverrides, ReadinessConfig, ReadinessPoller, ResourceClass, RunError,
    RunOrchestrator, ScalewayBackend, ScalewayBackendError, ScalewayConfig, SessionConfig,
    SessionError, SshConnector, expand_tilde, read_public_key, write_report,
};
use cli::{Cli, ResourceClassArg};

const EXIT_FAILURE: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid benchmark options: {0}")]
    Options(#[from] BenchmarkError),
    #[error(transparent)]
    Files(#[from] FileError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("ssh error: {0}")]
    Session(#[from] SessionError),
    #[error("benchmark run failed: {0}")]
    Run(#[from] RunError<ScalewayBackendError>),
    #[error("failed to write report: {0}")]
    Output(String),
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Run(err) if err.is_cancelled() => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run_benchmark(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_benchmark(cli: Cli) -> Result<(), CliError> {
    let plan = BenchmarkPlan::new(benchmark_options(&cli))?;
    let pipeline = plan.pipeline()?;
    let public_key = read_public_key(&cli.key_file)?;

    let scaleway_config =
        ScalewayConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let placement = PlacementOverrides {
        subnet_id: Some(cli.subnet_id.clone()),
        security_group_id: Some(cli.security_group_id.clone()),
        authorized_key: Some(public_key),
    };
    let spec = scaleway_config
        .as_spec(plan.options().resource_class, &placement)
        .map_err(|err| CliError::Config(err.to_string()))?;

    let policy = ReadinessConfig::load_without_cli_args()
        .and_then(|config| config.policy())
        .map_err(|err| CliError::Config(err.to_string()))?;
    let session_config = SessionConfig::load_without_cli_args()
        .map_err(|err| CliError::Config(err.to_string()))?
        .with_identity_file(expand_tilde(cli.key_file.trim()));
    let connector = SshConnector::with_process_runner(session_config)?;
    let backend =
        ScalewayBackend::new(scaleway_config).map_err(|err| CliError::Backend(err.to_string()))?;

    let orchestrator = RunOrchestrator::new(
        LifecycleManager::new(backend, ReadinessPoller::new(policy)),
        connector,
    );
    let cancel = CancellationToken::new();
    let watcher = spawn_cancel_watcher(
        cancel.clone(),
        cli.max_run_duration.map(Duration::from_secs),
    );
    let outcome = orchestrator.execute(&spec, &pipeline, &cancel).await;
    watcher.abort();

    let result = outcome?;
    deliver_report(result.payload().unwrap_or_default(), cli.output.as_deref())
}

fn benchmark_options(cli: &Cli) -> BenchmarkOptions {
    BenchmarkOptions {
        repo_url: cli.repo_url.clone(),
        branch: cli.branch.clone(),
        resource_class: resource_class(cli.resource_class),
        model_name: cli.model_name.clone(),
        model_mode: cli.model_mode.clone(),
        batch_size: cli.batch_size,
        ..BenchmarkOptions::default()
    }
}

const fn resource_class(arg: ResourceClassArg) -> ResourceClass {
    match arg {
        ResourceClassArg::Cpu => ResourceClass::Cpu,
        ResourceClassArg::Gpu => ResourceClass::Gpu,
    }
}

fn spawn_cancel_watcher(cancel: CancellationToken, limit: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = wait_for_interrupt() => warn!("interrupt received, cancelling run"),
            () = wait_for_limit(limit) => warn!(
                limit_secs = limit.map(|duration| duration.as_secs()),
                "maximum run duration reached, cancelling run"
            ),
        }
        cancel.cancel();
    })
}

async fn wait_for_interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for interrupts");
        future::pending::<()>().await;
    }
}

async fn wait_for_limit(limit: Option<Duration>) {
    match limit {
        Some(duration) => sleep(duration).await,
        None => future::pending::<()>().await,
    }
}

fn deliver_report(payload: &str, output: Option<&str>) -> Result<(), CliError> {
    if let Some(path) = output {
        write_report(path, payload)?;
        info!(path, "report written");
        return Ok(());
    }
    write_payload(io::stdout(), payload)
}

fn write_payload(mut target: impl Write, payload: &str) -> Result<(), CliError> {
    target
        .write_all(payload.as_bytes())
        .and_then(|()| {
            if payload.is_empty() || payload.ends_with('\n') {
                Ok(())
            } else {
                writeln!(target)
            }
        })
        .and_then(|()| target.flush())
        .map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
    if let CliError::Run(RunError::RemoteCommand { result, .. }) = err
        && let Some(diagnostics) = result.diagnostics()
        && !diagnostics.stderr.trim().is_empty()
    {
        writeln!(
            target,
            "stderr of step {} ({}):\n{}",
            diagnostics.step,
            diagnostics.name,
            diagnostics.stderr.trim_end()
        )
        .ok();
    }
}
