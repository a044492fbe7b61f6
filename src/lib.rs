//! codegen-pipeline - generate, test, review and package Python code
//!
//! This library runs a prompt through a fixed sequence of stages: a large
//! model writes a function, a small model writes sample data for it, an E2B
//! sandbox runs both, the small model reviews the code against its output,
//! and approved code is written out as an installable module.

pub mod backoff;
pub mod code;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod sandbox;
pub mod secrets;
pub mod stages;
pub mod state;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::PollBackoff;
pub use config::{
    AnthropicConfig, ModelsConfig, OutputConfig, PipelineConfig, SandboxConfig, Validate,
    ValidationResult,
};
pub use error::{Error, Result};
pub use llm::{AnthropicClient, CompletionRequest, LanguageModel, Message, Role};
pub use pipeline::Pipeline;
pub use report::{format_execution_result, format_pipeline_result, format_review_result};
pub use sandbox::{CodeSandbox, E2bSandbox};
pub use secrets::{Credentials, SecretRef, SecretSource, SecretsManager};
pub use stages::{PackageMetadata, Stage, StageName};
pub use state::{
    ExecutionError, ExecutionResult, PackageInfo, PipelineResult, PipelineState, ReviewResult,
    TestCases,
};
pub use task::CodegenTask;
