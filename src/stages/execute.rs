//! Executor stage: runs the code and its sample data in the sandbox.

use std::sync::Arc;

use async_trait::async_trait;

use crate::code::clean_tests_for_execution;
use crate::error::Result;
use crate::sandbox::CodeSandbox;
use crate::state::{ExecutionResult, PipelineState};

use super::{Stage, StageName};

/// Produces `execution_result`.
///
/// Sandbox failures are recorded as a failed execution rather than
/// returned, so routing treats them like code that raised.
pub struct Executor {
    sandbox: Arc<dyn CodeSandbox>,
}

impl Executor {
    /// Creates the stage over `sandbox`.
    pub fn new(sandbox: Arc<dyn CodeSandbox>) -> Self {
        Self { sandbox }
    }
}

/// Joins the generated code and cleaned sample data into one program.
fn assemble_program(code: &str, test_code: &str) -> String {
    let tests = clean_tests_for_execution(test_code);
    if tests.trim().is_empty() {
        code.to_string()
    } else {
        format!("{}\n\n{}", code, tests)
    }
}

#[async_trait]
impl Stage for Executor {
    fn name(&self) -> StageName {
        StageName::Execute
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let program = assemble_program(&state.generated_code, &state.test_cases.code);
        tracing::debug!(sandbox = %self.sandbox.name(), program = %program, "executing code");

        let result = match self.sandbox.run_code(&program).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(sandbox = %self.sandbox.name(), error = %e, "exception during code execution");
                ExecutionResult::sandbox_failure(e.to_string())
            }
        };

        tracing::info!(success = result.success, "code execution complete");
        state.execution_result = Some(result);
        Ok(())
    }
}
