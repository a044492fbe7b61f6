//! Human-readable reports of execution and review results.

use crate::state::{ExecutionResult, PipelineResult, ReviewResult};

const RULE: &str = "--------------------";

fn push_section(out: &mut Vec<String>, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    out.push(format!("\n{}:", title));
    out.extend(lines.iter().cloned());
}

fn push_bullets(out: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push(format!("\n{}:", title));
    out.extend(items.iter().map(|item| format!("• {}", item)));
}

/// Formats an execution result for people and for the reviewer model.
pub fn format_execution_result(result: &ExecutionResult) -> String {
    let mut out = vec!["Execution Results:".to_string(), RULE.to_string()];
    out.push(format!(
        "Status: {}",
        if result.success { "✅ Success" } else { "❌ Failed" }
    ));

    push_section(&mut out, "Output", &result.stdout);
    push_section(&mut out, "Results", &result.results);
    push_section(&mut out, "Errors", &result.stderr);

    if let Some(error) = &result.error {
        out.push("\nError Message:".to_string());
        out.push(error.to_string());
        if !error.traceback.trim().is_empty() {
            out.push(error.traceback.clone());
        }
    }

    out.join("\n")
}

/// Formats a review verdict.
///
/// A review whose raw text has no `<approved>` element cannot be trusted
/// as structured; the raw response is shown instead.
pub fn format_review_result(review: &ReviewResult) -> String {
    if !review.raw_review.to_lowercase().contains("<approved>") {
        return format!(
            "Error formatting review: no <approved> element in review\nRaw review:\n{}",
            review.raw_review
        );
    }

    let mut out = vec!["Code Review Summary:".to_string(), RULE.to_string()];
    out.push(format!(
        "Approved: {}",
        if review.approved { "✅ Yes" } else { "❌ No" }
    ));

    push_bullets(&mut out, "Issues Found", &review.issues);
    push_bullets(&mut out, "Suggestions", &review.suggestions);
    push_bullets(&mut out, "Positive Comments", &review.positive_comments);

    out.join("\n")
}

/// Formats a whole run for the terminal.
pub fn format_pipeline_result(result: &PipelineResult) -> String {
    let mut out = Vec::new();
    let banner = "=".repeat(60);

    out.push(banner.clone());
    out.push(format!(
        "Run {}: {}",
        result.run_id,
        if result.success { "SUCCESS" } else { "FAILED" }
    ));
    out.push(banner);
    out.push(format!(
        "Stages: {}",
        result
            .stages
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    ));
    out.push(format!("Attempts: {}", result.attempts));
    out.push(format!("Duration: {:.1?}", result.duration));

    if let Some(error) = &result.error {
        out.push(format!("Error: {}", error));
    }

    if !result.code.is_empty() {
        out.push("\n=== Generated Code ===".to_string());
        out.push(result.code.clone());
    }
    if let Some(execution) = &result.execution_result {
        out.push("\n=== Execution Results ===".to_string());
        out.push(format_execution_result(execution));
    }
    if let Some(review) = &result.review_result {
        out.push("\n=== Code Review ===".to_string());
        out.push(format_review_result(review));
    }
    if let Some(package) = &result.package_info {
        out.push("\n=== Package ===".to_string());
        out.push(format!("Module: {}", package.module_path.display()));
        out.push(format!("Standalone file: {}", package.standalone_file.display()));
    }

    out.join("\n")
}
