//! Reviewer stage: asks the small model to judge the code and its output.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::config::ModelsConfig;
use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt::{review_message, REVIEW_INSTRUCTIONS};
use crate::report::format_execution_result;
use crate::state::{PipelineState, ReviewResult};

use super::{Stage, StageName};

static APPROVED: OnceLock<Regex> = OnceLock::new();
static ISSUE: OnceLock<Regex> = OnceLock::new();
static SUGGESTION: OnceLock<Regex> = OnceLock::new();
static POSITIVE: OnceLock<Regex> = OnceLock::new();

fn element(cell: &'static OnceLock<Regex>, tag: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(&format!(r"(?is)<{tag}>(.*?)</{tag}>")).expect("valid element regex")
    })
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collect(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .map(|c| unescape_xml(c[1].trim()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses the reviewer's XML verdict.
///
/// The code is approved only when an `<approved>` element holds `true`;
/// anything else, including malformed output, counts as rejection.
pub fn parse_review(raw: &str) -> ReviewResult {
    let approved = APPROVED
        .get_or_init(|| Regex::new(r"(?i)<approved>\s*true\s*</approved>").expect("valid approved regex"))
        .is_match(raw);

    ReviewResult {
        approved,
        issues: collect(element(&ISSUE, "issue"), raw),
        suggestions: collect(element(&SUGGESTION, "suggestion"), raw),
        positive_comments: collect(element(&POSITIVE, "positive"), raw),
        raw_review: raw.to_string(),
    }
}

/// Produces `review_result`.
pub struct Reviewer {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
}

impl Reviewer {
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
impl Stage for Reviewer {
    fn name(&self) -> StageName {
        StageName::Review
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let report = state
            .execution_result
            .as_ref()
            .map(format_execution_result)
            .unwrap_or_else(|| "No execution result available.".to_string());

        tracing::info!(model = %self.model.model(), "reviewing code");
        let request = CompletionRequest::new(
            REVIEW_INSTRUCTIONS,
            review_message(&state.generated_code, &report),
        )
        .with_sampling(self.max_tokens, self.temperature);
        let response = self.model.complete(request).await?;

        let review = parse_review(&response);
        tracing::info!(
            approved = review.approved,
            issues = review.issues.len(),
            "code review complete"
        );
        state.review_result = Some(review);
        Ok(())
    }
}
