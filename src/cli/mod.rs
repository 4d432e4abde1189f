//! Command-line interface definitions for the `benchferry` binary.
//!
//! This module only depends on clap so the build script can include it when
//! generating the manual page.

use clap::{Parser, ValueEnum};

/// Hardware class requested on the command line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum ResourceClassArg {
    /// General purpose CPU instance.
    #[default]
    Cpu,
    /// GPU instance; the image is built with GPU support.
    Gpu,
}

/// Run a `TorchServe` benchmark on a disposable Scaleway instance.
#[derive(Debug, Parser)]
#[command(
    name = "benchferry",
    about = "Run a TorchServe benchmark on a disposable Scaleway instance",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Private SSH key used to reach the instance. Its `.pub` sibling is
    /// authorised on the instance at creation time.
    #[arg(long, value_name = "PATH")]
    pub(crate) key_file: String,
    /// Private network the instance joins.
    #[arg(long, value_name = "ID")]
    pub(crate) subnet_id: String,
    /// Security group applied to the instance.
    #[arg(long, value_name = "ID")]
    pub(crate) security_group_id: String,
    /// Branch of the benchmark repository to check out.
    #[arg(long, value_name = "BRANCH", default_value = "master")]
    pub(crate) branch: String,
    /// Hardware class to benchmark on.
    #[arg(long, value_enum, default_value_t = ResourceClassArg::Cpu)]
    pub(crate) resource_class: ResourceClassArg,
    /// Model to benchmark.
    #[arg(long, value_name = "NAME", default_value = "vgg11")]
    pub(crate) model_name: String,
    /// Model execution mode (for example `eager` or `scripted`).
    #[arg(long, value_name = "MODE", default_value = "eager")]
    pub(crate) model_mode: String,
    /// Batch size used by the workload.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub(crate) batch_size: u32,
    /// Git URL of the benchmark repository.
    #[arg(
        long,
        value_name = "URL",
        default_value = "https://github.com/pytorch/serve.git"
    )]
    pub(crate) repo_url: String,
    /// Write the report here instead of standard output.
    #[arg(long, short, value_name = "PATH")]
    pub(crate) output: Option<String>,
    /// Cancel the run (and tear the instance down) after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub(crate) max_run_duration: Option<u64>,
}
