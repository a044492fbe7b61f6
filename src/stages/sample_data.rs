//! Sample-data stage: writes a script that exercises the generated function.

use std::sync::Arc;

use async_trait::async_trait;

use crate::code::{analyze_function, clean_generated_tests, fallback_test};
use crate::config::ModelsConfig;
use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt::{extract_test_data, sample_data_prompt};
use crate::state::{PipelineState, TestCases};

use super::{Stage, StageName};

/// Produces `test_cases` for the generated code.
///
/// Never fails: when the model errors or returns nothing usable, a smoke
/// test derived from the function signature is used instead.
pub struct SampleDataGenerator {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
}

impl SampleDataGenerator {
    /// Creates the stage using `model` with the configured sampling.
    pub fn new(model: Arc<dyn LanguageModel>, models: &ModelsConfig) -> Self {
        Self {
            model,
            max_tokens: models.max_tokens,
            temperature: models.temperature,
        }
    }
}

#[async_trait]
impl Stage for SampleDataGenerator {
    fn name(&self) -> StageName {
        StageName::GenerateSampleData
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let existing = extract_test_data(&state.prompt);
        let signature = analyze_function(&state.generated_code);

        let request = CompletionRequest::user_only(sample_data_prompt(
            &state.generated_code,
            &existing,
        ))
        .with_sampling(self.max_tokens, self.temperature);

        let code = match self.model.complete(request).await {
            Ok(response) => {
                let cleaned = clean_generated_tests(&response);
                if cleaned.trim().is_empty() {
                    tracing::warn!(function = %signature.name, "model returned no test code, using fallback");
                    fallback_test(&signature)
                } else {
                    cleaned
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "error generating test cases, using fallback");
                fallback_test(&signature)
            }
        };

        tracing::info!(
            function = %signature.name,
            has_prompt_data = !existing.is_empty(),
            "sample data ready"
        );
        state.test_cases = TestCases {
            code,
            original_data: existing,
        };
        Ok(())
    }
}
