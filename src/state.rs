//! The record shared by every stage of a pipeline run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stages::StageName;

/// Error raised by code running inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Exception class name (e.g. `ValueError`).
    pub name: String,
    /// Exception message.
    pub value: String,
    /// Formatted traceback, if available.
    #[serde(default)]
    pub traceback: String,
}

impl ExecutionError {
    /// Error describing a failure to reach the sandbox at all.
    pub fn sandbox(message: impl Into<String>) -> Self {
        Self {
            name: "SandboxError".to_string(),
            value: message.into(),
            traceback: String::new(),
        }
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Output of running code in the sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// True when the code ran without raising.
    pub success: bool,
    /// Chunks written to stdout.
    #[serde(default)]
    pub stdout: Vec<String>,
    /// Chunks written to stderr.
    #[serde(default)]
    pub stderr: Vec<String>,
    /// Text form of rich results (e.g. the value of the last expression).
    #[serde(default)]
    pub results: Vec<String>,
    /// The raised error, if any.
    #[serde(default)]
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    /// Builds a result from collected output, deriving `success` from `error`.
    pub fn from_parts(
        stdout: Vec<String>,
        stderr: Vec<String>,
        results: Vec<String>,
        error: Option<ExecutionError>,
    ) -> Self {
        Self {
            success: error.is_none(),
            stdout,
            stderr,
            results,
            error,
        }
    }

    /// A failed result for when the sandbox itself could not run the code.
    pub fn sandbox_failure(message: impl Into<String>) -> Self {
        Self::from_parts(vec![], vec![], vec![], Some(ExecutionError::sandbox(message)))
    }
}

/// Verdict of the review stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Whether the reviewer approved the code.
    pub approved: bool,
    /// Problems the reviewer found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Improvements the reviewer suggested.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Positive remarks.
    #[serde(default)]
    pub positive_comments: Vec<String>,
    /// The reviewer's full response.
    #[serde(default)]
    pub raw_review: String,
}

/// Sample-data script produced for the generated code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCases {
    /// Python code exercising the generated function.
    pub code: String,
    /// Test data found in the user's prompt, if any.
    #[serde(default)]
    pub original_data: String,
}

/// Where the packaged module was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Module directory name (`generated_module_<timestamp>`).
    pub module_name: String,
    /// Module directory.
    pub module_path: PathBuf,
    /// Standalone copy of the code.
    pub standalone_file: PathBuf,
    /// Package `__init__.py`.
    pub init_file: PathBuf,
    /// setuptools script.
    pub setup_file: PathBuf,
    /// Run metadata.
    pub metadata_file: PathBuf,
}

/// Mutable record threaded through every stage of one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Unique identifier of this run.
    pub run_id: String,
    /// The user's prompt, dedented.
    pub prompt: String,
    /// Code produced by the generator.
    pub generated_code: String,
    /// Sample-data script.
    pub test_cases: TestCases,
    /// Result of the most recent sandbox execution.
    pub execution_result: Option<ExecutionResult>,
    /// Result of the most recent review.
    pub review_result: Option<ReviewResult>,
    /// Packaging output.
    pub package_info: Option<PackageInfo>,
    /// Generation attempts made so far.
    pub attempts: u32,
    /// Stages run, in order.
    pub stages: Vec<StageName>,
    /// Error that halted the run.
    pub error: Option<String>,
}

impl PipelineState {
    /// Creates a fresh state for `prompt`.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// True once execution passed, review approved and the module was written.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.execution_result.as_ref().is_some_and(|r| r.success)
            && self.review_result.as_ref().is_some_and(|r| r.approved)
            && self.package_info.is_some()
    }

    /// Converts the final state into the run's public result.
    pub fn into_result(self, duration: Duration) -> PipelineResult {
        let success = self.succeeded();
        PipelineResult {
            run_id: self.run_id,
            success,
            code: self.generated_code,
            test_code: self.test_cases.code,
            execution_result: self.execution_result,
            review_result: self.review_result,
            package_info: self.package_info,
            attempts: self.attempts,
            stages: self.stages,
            duration,
            error: self.error,
        }
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique identifier of this run.
    pub run_id: String,
    /// True when code was generated, ran cleanly, was approved and packaged.
    pub success: bool,
    /// The last generated code.
    pub code: String,
    /// The sample-data script run alongside the code.
    pub test_code: String,
    /// Last execution result.
    pub execution_result: Option<ExecutionResult>,
    /// Last review result.
    pub review_result: Option<ReviewResult>,
    /// Packaging output on success.
    pub package_info: Option<PackageInfo>,
    /// Generation attempts made.
    pub attempts: u32,
    /// Stages run, in order.
    pub stages: Vec<StageName>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Why the run halted, if it failed.
    pub error: Option<String>,
}
