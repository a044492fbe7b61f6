//! Pipeline orchestration.
//!
//! Drives one run through generation, sample data, sandbox execution,
//! review and packaging. Routing is a fixed sequence: a failed execution or
//! a rejected review either loops back to generation (when attempts remain)
//! or halts the run.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{PipelineConfig, Validate};
use crate::error::{Error, Result};
use crate::llm::{AnthropicClient, LanguageModel};
use crate::prompt::dedent;
use crate::sandbox::{CodeSandbox, E2bSandbox};
use crate::secrets::{Credentials, SecretsManager};
use crate::stages::{
    Executor, Generator, Packager, Reviewer, SampleDataGenerator, Stage, StageName,
};
use crate::state::{PipelineResult, PipelineState};

/// Where a run goes after a stage completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Stage(StageName),
    Done,
}

/// Runs prompts through every stage.
pub struct Pipeline {
    max_attempts: u32,
    generator: Generator,
    sample_data: SampleDataGenerator,
    executor: Executor,
    reviewer: Reviewer,
    packager: Packager,
    sandbox: Arc<dyn CodeSandbox>,
    secrets: SecretsManager,
}

impl Pipeline {
    /// Assembles a pipeline from explicit model and sandbox backends.
    ///
    /// `large` writes the code; `small` writes sample data and reviews.
    pub fn new(
        config: &PipelineConfig,
        large: Arc<dyn LanguageModel>,
        small: Arc<dyn LanguageModel>,
        sandbox: Arc<dyn CodeSandbox>,
    ) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            generator: Generator::new(large, &config.models),
            sample_data: SampleDataGenerator::new(small.clone(), &config.models),
            executor: Executor::new(sandbox.clone()),
            reviewer: Reviewer::new(small, &config.models),
            packager: Packager::new(config.output.dir.clone(), config.models.clone()),
            sandbox,
            secrets: SecretsManager::new(),
        }
    }

    /// Validates `config` and builds the Anthropic and E2B backends.
    pub fn from_config(config: &PipelineConfig, credentials: &Credentials) -> Result<Self> {
        for warning in config.validate().into_result()? {
            tracing::warn!(warning = %warning, "configuration warning");
        }

        let large: Arc<dyn LanguageModel> = Arc::new(AnthropicClient::new(
            config.anthropic.clone(),
            config.models.large.clone(),
            credentials.anthropic_api_key.clone(),
        )?);
        let small: Arc<dyn LanguageModel> = Arc::new(AnthropicClient::new(
            config.anthropic.clone(),
            config.models.small.clone(),
            credentials.anthropic_api_key.clone(),
        )?);
        let sandbox: Arc<dyn CodeSandbox> = Arc::new(E2bSandbox::new(
            config.sandbox.clone(),
            credentials.e2b_api_key.clone(),
        )?);

        Ok(Self::new(config, large, small, sandbox).with_secrets(credentials.secrets().clone()))
    }

    /// Uses `secrets` to redact error text surfaced in results.
    pub fn with_secrets(mut self, secrets: SecretsManager) -> Self {
        self.secrets = secrets;
        self
    }

    /// Stage names in execution order.
    pub fn stages() -> &'static [StageName] {
        &StageName::ALL
    }

    /// Runs `prompt` through the pipeline.
    ///
    /// Never returns an error: failures are reported through
    /// [`PipelineResult::error`]. The sandbox is cleaned up on every path.
    pub async fn run(&self, prompt: &str) -> PipelineResult {
        let start = Instant::now();
        let mut state = PipelineState::new(dedent(prompt));

        tracing::info!(
            run_id = %state.run_id,
            max_attempts = self.max_attempts,
            "starting pipeline run"
        );

        if let Err(e) = self.drive(&mut state).await {
            let message = self.secrets.redact(&e.to_string());
            tracing::error!(
                run_id = %state.run_id,
                stage = ?state.stages.last(),
                error = %message,
                "pipeline halted"
            );
            state.error = Some(message);
        }

        self.sandbox.cleanup().await;

        let result = state.into_result(start.elapsed());
        tracing::info!(
            run_id = %result.run_id,
            success = result.success,
            attempts = result.attempts,
            duration = ?result.duration,
            "pipeline run complete"
        );
        result
    }

    fn stage(&self, name: StageName) -> &dyn Stage {
        match name {
            StageName::Generate => &self.generator,
            StageName::GenerateSampleData => &self.sample_data,
            StageName::Execute => &self.executor,
            StageName::Review => &self.reviewer,
            StageName::Package => &self.packager,
        }
    }

    async fn drive(&self, state: &mut PipelineState) -> Result<()> {
        let mut next = Next::Stage(StageName::Generate);

        while let Next::Stage(name) = next {
            let stage = self.stage(name);
            tracing::info!(stage = %stage.name(), attempt = state.attempts, "running stage");
            state.stages.push(stage.name());
            stage.run(state).await?;
            next = self.route(stage.name(), state)?;
        }

        Ok(())
    }

    /// Picks the stage after `completed`, or fails when no attempts remain.
    fn route(&self, completed: StageName, state: &PipelineState) -> Result<Next> {
        let next = match completed {
            StageName::Generate => Next::Stage(StageName::GenerateSampleData),
            StageName::GenerateSampleData => Next::Stage(StageName::Execute),
            StageName::Execute => match &state.execution_result {
                Some(result) if result.success => Next::Stage(StageName::Review),
                result => {
                    let reason = result
                        .as_ref()
                        .and_then(|r| r.error.as_ref())
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no execution result".to_string());
                    self.retry_or(state, Error::ExecutionFailed(reason))?
                }
            },
            StageName::Review => match &state.review_result {
                Some(review) if review.approved => Next::Stage(StageName::Package),
                review => {
                    let issues = review
                        .as_ref()
                        .map(|r| r.issues.join("; "))
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| "no issues listed".to_string());
                    self.retry_or(state, Error::ReviewRejected(issues))?
                }
            },
            StageName::Package => Next::Done,
        };
        Ok(next)
    }

    fn retry_or(&self, state: &PipelineState, error: Error) -> Result<Next> {
        if state.attempts >= self.max_attempts {
            return Err(error);
        }
        tracing::warn!(
            attempt = state.attempts,
            max_attempts = self.max_attempts,
            reason = %error,
            "retrying generation"
        );
        Ok(Next::Stage(StageName::Generate))
    }
}
