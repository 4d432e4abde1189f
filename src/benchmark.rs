//! TorchServe benchmark plan.
//!
//! Renders the five remote steps that fetch the serving stack, build its
//! container image, install the load generator, run the preset workload and
//! print the resulting report. Every interpolated value is shell-escaped.

use std::fmt;
use std::str::FromStr;

use shell_escape::unix::escape;
use thiserror::Error;

use crate::pipeline::{ExecutionPipeline, PipelineError, PipelineStep};

/// Default source repository.
pub const DEFAULT_REPO_URL: &str = "https://github.com/pytorch/serve.git";
/// Default branch.
pub const DEFAULT_BRANCH: &str = "master";
/// Default model.
pub const DEFAULT_MODEL: &str = "vgg11";
/// Default model mode.
pub const DEFAULT_MODE: &str = "eager";
/// Default report location on the remote host.
pub const DEFAULT_REPORT_PATH: &str = "/tmp/benchmark/ab_report.csv";

const CHECKOUT_DIR: &str = "serve";

/// Hardware class the benchmark targets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResourceClass {
    /// CPU-only instance.
    #[default]
    Cpu,
    /// GPU instance.
    Gpu,
}

impl ResourceClass {
    /// Lowercase label used in image tags and preset paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceClass {
    type Err = BenchmarkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            other => Err(BenchmarkError::UnknownResourceClass(other.to_owned())),
        }
    }
}

/// Errors raised while building a benchmark plan.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BenchmarkError {
    /// Raised for a resource class other than `cpu` or `gpu`.
    #[error("unknown resource class '{0}', expected cpu or gpu")]
    UnknownResourceClass(String),
    /// Raised when an option is blank.
    #[error("benchmark option {0} must not be empty")]
    Empty(&'static str),
    /// Raised when an option contains control characters.
    #[error("benchmark option {0} must not contain control characters")]
    ControlCharacters(&'static str),
    /// Raised when the batch size is zero.
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    /// Raised when the rendered steps do not form a valid pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// User-selected benchmark parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BenchmarkOptions {
    /// Git URL of the serving stack.
    pub repo_url: String,
    /// Branch to check out and build.
    pub branch: String,
    /// Hardware class.
    pub resource_class: ResourceClass,
    /// Model preset name.
    pub model_name: String,
    /// Model mode (`eager`, `scripted`).
    pub model_mode: String,
    /// Batch size selecting the preset file.
    pub batch_size: u32,
    /// Remote path of the report printed by the last step.
    pub report_path: String,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_owned(),
            branch: DEFAULT_BRANCH.to_owned(),
            resource_class: ResourceClass::Cpu,
            model_name: DEFAULT_MODEL.to_owned(),
            model_mode: DEFAULT_MODE.to_owned(),
            batch_size: 1,
            report_path: DEFAULT_REPORT_PATH.to_owned(),
        }
    }
}

impl BenchmarkOptions {
    /// Checks that every option is usable in a remote command.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError`] naming the first invalid option.
    pub fn validate(&self) -> Result<(), BenchmarkError> {
        for (name, value) in [
            ("repo_url", &self.repo_url),
            ("branch", &self.branch),
            ("model_name", &self.model_name),
            ("model_mode", &self.model_mode),
            ("report_path", &self.report_path),
        ] {
            if value.trim().is_empty() {
                return Err(BenchmarkError::Empty(name));
            }
            if value.chars().any(char::is_control) {
                return Err(BenchmarkError::ControlCharacters(name));
            }
        }
        if self.batch_size == 0 {
            return Err(BenchmarkError::ZeroBatchSize);
        }
        Ok(())
    }
}

/// Validated benchmark plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BenchmarkPlan {
    options: BenchmarkOptions,
}

impl BenchmarkPlan {
    /// Validates `options` and wraps them.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError`] when an option is invalid.
    pub fn new(options: BenchmarkOptions) -> Result<Self, BenchmarkError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The options the plan was built from.
    #[must_use]
    pub const fn options(&self) -> &BenchmarkOptions {
        &self.options
    }

    /// Preset configuration path relative to the benchmarks directory.
    #[must_use]
    pub fn preset_config(&self) -> String {
        let options = &self.options;
        format!(
            "preset_configs/{}/{}/{}_batch_{}.json",
            options.model_name, options.resource_class, options.model_mode, options.batch_size
        )
    }

    /// Container image tag built and benchmarked by the plan.
    #[must_use]
    pub fn image_tag(&self) -> String {
        format!("torchserve:{}", self.options.resource_class)
    }

    /// Renders the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> Vec<PipelineStep> {
        let options = &self.options;
        let branch = escape(options.branch.as_str().into());
        let tag = self.image_tag();
        let image = escape(tag.as_str().into());
        let gpu_flag = match options.resource_class {
            ResourceClass::Gpu => " --gpu",
            ResourceClass::Cpu => "",
        };
        let preset = self.preset_config();

        vec![
            PipelineStep::new(
                "fetch-source",
                format!(
                    "git clone {} {CHECKOUT_DIR} && cd {CHECKOUT_DIR} && git checkout {branch}",
                    escape(options.repo_url.as_str().into())
                ),
            ),
            PipelineStep::new(
                "build-image",
                format!(
                    "cd {CHECKOUT_DIR}/docker && ./build_image.sh{gpu_flag} --branch_name {branch} --tag {image}"
                ),
            ),
            PipelineStep::new(
                "install-dependencies",
                format!(
                    "cd {CHECKOUT_DIR}/benchmarks && pip install -U -r requirements-ab.txt && sudo apt-get install -y apache2-utils"
                ),
            ),
            PipelineStep::new(
                "run-workload",
                format!(
                    "cd {CHECKOUT_DIR}/benchmarks && python benchmark-ab.py --config {} --exec_env docker --image {image}",
                    escape(preset.as_str().into())
                ),
            ),
            PipelineStep::new(
                "collect-result",
                format!("cat {}", escape(options.report_path.as_str().into())),
            ),
        ]
    }

    /// Wraps the rendered steps in an [`ExecutionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Pipeline`] if the rendered steps are rejected.
    pub fn pipeline(&self) -> Result<ExecutionPipeline, BenchmarkError> {
        Ok(ExecutionPipeline::new(self.steps())?)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for benchmark plan rendering.

    use rstest::rstest;

    use super::*;

    fn commands(plan: &BenchmarkPlan) -> Vec<String> {
        plan.steps()
            .iter()
            .map(|step| step.command().to_owned())
            .collect()
    }

    #[test]
    fn default_plan_renders_five_ordered_steps() {
        let plan = BenchmarkPlan::new(BenchmarkOptions::default()).expect("valid defaults");
        let names: Vec<_> = plan
            .steps()
            .iter()
            .map(|step| step.name().to_owned())
            .collect();
        assert_eq!(
            names,
            [
                "fetch-source",
                "build-image",
                "install-dependencies",
                "run-workload",
                "collect-result",
            ]
        );

        let rendered = commands(&plan);
        assert!(rendered[0].starts_with("git clone "));
        assert!(rendered[0].contains("github.com/pytorch/serve.git"));
        assert!(rendered[0].ends_with(" serve && cd serve && git checkout master"));
        assert!(
            rendered[1].starts_with("cd serve/docker && ./build_image.sh --branch_name master --tag ")
        );
        assert!(rendered[1].contains("torchserve:cpu"));
        assert!(rendered[3].contains("--config preset_configs/vgg11/cpu/eager_batch_1.json"));
        assert!(rendered[3].contains("--exec_env docker --image "));
        assert_eq!(rendered[4], "cat /tmp/benchmark/ab_report.csv");
    }

    #[test]
    fn gpu_plan_builds_gpu_image() {
        let plan = BenchmarkPlan::new(BenchmarkOptions {
            resource_class: ResourceClass::Gpu,
            batch_size: 8,
            ..BenchmarkOptions::default()
        })
        .expect("valid options");
        let rendered = commands(&plan);
        assert!(rendered[1].contains("./build_image.sh --gpu --branch_name master"));
        assert!(rendered[3].contains("preset_configs/vgg11/gpu/eager_batch_8.json"));
    }

    #[test]
    fn branch_is_shell_escaped() {
        let plan = BenchmarkPlan::new(BenchmarkOptions {
            branch: String::from("feat; rm -rf ~"),
            ..BenchmarkOptions::default()
        })
        .expect("valid options");
        let rendered = commands(&plan);
        assert!(rendered[0].ends_with("git checkout 'feat; rm -rf ~'"));
    }

    #[rstest]
    #[case(BenchmarkOptions { batch_size: 0, ..BenchmarkOptions::default() }, BenchmarkError::ZeroBatchSize)]
    #[case(BenchmarkOptions { branch: String::from(" "), ..BenchmarkOptions::default() }, BenchmarkError::Empty("branch"))]
    #[case(
        BenchmarkOptions { model_name: String::from("vgg\n11"), ..BenchmarkOptions::default() },
        BenchmarkError::ControlCharacters("model_name")
    )]
    fn rejects_invalid_options(#[case] options: BenchmarkOptions, #[case] expected: BenchmarkError) {
        assert_eq!(BenchmarkPlan::new(options), Err(expected));
    }

    #[rstest]
    #[case("cpu", ResourceClass::Cpu)]
    #[case(" GPU ", ResourceClass::Gpu)]
    fn parses_resource_class(#[case] input: &str, #[case] expected: ResourceClass) {
        assert_eq!(input.parse::<ResourceClass>(), Ok(expected));
    }

    #[test]
    fn plan_forms_a_valid_pipeline() {
        let plan = BenchmarkPlan::new(BenchmarkOptions::default()).expect("valid defaults");
        let pipeline = plan.pipeline().expect("pipeline");
        assert_eq!(pipeline.steps().len(), 5);
    }
}
