//! Generator stage: asks the large model for the function.

use std::sync::Arc;

use async_trait::async_trait;

use crate::code::strip_code_fences;
use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt::{GenerationPromptBuilder, GENERATION_INSTRUCTIONS};
use crate::state::PipelineState;

use super::{Stage, StageName};

/// Produces `generated_code` from the user's prompt.
pub struct Generator {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
}

impl Generator {
    /// Creates a generator using `model` with the configured sampling.
    pub fn new(model: Arc<dyn LanguageModel>, models: &ModelsConfig) -> Self {
        Self {
            model,
            max_tokens: models.max_tokens,
            temperature: models.temperature,
        }
    }
}

/// Reasons the previous attempt was not accepted.
fn retry_feedback(state: &PipelineState) -> Vec<String> {
    let mut feedback = Vec::new();

    if let Some(execution) = state.execution_result.as_ref().filter(|r| !r.success) {
        if let Some(error) = &execution.error {
            feedback.push(format!("Execution raised {}", error));
        }
        feedback.extend(
            execution
                .stderr
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .map(|line| format!("stderr: {}", line)),
        );
    }

    if let Some(review) = state.review_result.as_ref().filter(|r| !r.approved) {
        feedback.extend(review.issues.iter().map(|i| format!("Review issue: {}", i)));
        feedback.extend(
            review
                .suggestions
                .iter()
                .map(|s| format!("Review suggestion: {}", s)),
        );
    }

    feedback
}

#[async_trait]
impl Stage for Generator {
    fn name(&self) -> StageName {
        StageName::Generate
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let mut builder = GenerationPromptBuilder::new(state.prompt.as_str());
        if state.attempts > 0 {
            builder = builder
                .with_previous_code(state.generated_code.as_str())
                .with_feedback(retry_feedback(state));
        }

        tracing::info!(
            model = %self.model.model(),
            attempt = state.attempts + 1,
            "generating code"
        );

        let request = CompletionRequest::new(GENERATION_INSTRUCTIONS, builder.build())
            .with_sampling(self.max_tokens, self.temperature);
        let response = self.model.complete(request).await?;

        let code = strip_code_fences(&response);
        if code.is_empty() {
            return Err(Error::Model("generator returned no code".to_string()));
        }

        state.generated_code = code;
        state.attempts += 1;
        // results of the previous attempt no longer describe this code
        state.execution_result = None;
        state.review_result = None;

        tracing::info!(bytes = state.generated_code.len(), "code generation complete");
        Ok(())
    }
}
