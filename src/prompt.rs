//! Prompt text and prompt builders for the model-backed stages.

/// Instructions for the generator model.
pub const GENERATION_INSTRUCTIONS: &str = "You are a Python code generation agent. Generate ONLY the Python function code.
DO NOT include any explanations, markdown formatting, or backticks.
DO NOT include any text before or after the code.
Start directly with 'def' and end with the last line of code.

Requirements:
1. Well-structured and modular
2. Include proper error handling
3. Follow PEP 8 style guidelines
4. Include docstrings
5. Be efficient and maintainable
";

/// Instructions for the reviewer model.
pub const REVIEW_INSTRUCTIONS: &str = "You are a code review agent. Review the Python code for:
1. Code quality and best practices
2. Potential bugs or issues
3. Security concerns
4. Performance considerations
5. Documentation completeness

Provide your response in XML format like this:
<review>
    <approved>true/false</approved>
    <issues>
        <issue>Issue description 1</issue>
        <issue>Issue description 2</issue>
    </issues>
    <suggestions>
        <suggestion>Suggestion 1</suggestion>
        <suggestion>Suggestion 2</suggestion>
    </suggestions>
    <comments>
        <positive>Positive comment</positive>
    </comments>
</review>
";

/// Markers that introduce test data in a user prompt, with optional end marker.
const TEST_DATA_MARKERS: &[(&str, &str)] = &[
    ("TEST DATA:", ""),
    ("SAMPLE DATA:", ""),
    ("TEST CASES:", ""),
    ("```python", "```"),
];

/// Removes whitespace common to the start of every non-blank line.
///
/// Whitespace-only lines are emptied and do not affect the margin.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(|common, indent| {
            let shared = common
                .char_indices()
                .zip(indent.chars())
                .take_while(|((_, a), b)| a == b)
                .last()
                .map_or(0, |((i, a), _)| i + a.len_utf8());
            &common[..shared]
        })
        .unwrap_or("");

    let mut out: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        if line.trim().is_empty() {
            out.push("");
        } else {
            out.push(line.strip_prefix(margin).unwrap_or(line));
        }
    }
    out.join("\n")
}

/// Extracts test data the user embedded in a prompt.
///
/// Label markers run to the end of the prompt; a fenced python block runs
/// to its closing fence. Returns an empty string when none is present.
pub fn extract_test_data(prompt: &str) -> String {
    for (start_marker, end_marker) in TEST_DATA_MARKERS {
        let Some(found) = prompt.find(start_marker) else {
            continue;
        };
        let start = found + start_marker.len();
        let rest = &prompt[start..];
        let data = if end_marker.is_empty() {
            rest
        } else {
            rest.find(end_marker).map_or(rest, |end| &rest[..end])
        };
        return data.trim().to_string();
    }
    String::new()
}

/// Builder for the generator's user message.
pub struct GenerationPromptBuilder {
    user_prompt: String,
    previous_code: Option<String>,
    feedback: Vec<String>,
}

impl GenerationPromptBuilder {
    /// Creates a builder for the given user request.
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            previous_code: None,
            feedback: Vec::new(),
        }
    }

    /// Sets the code produced by the previous failed attempt.
    pub fn with_previous_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        if !code.trim().is_empty() {
            self.previous_code = Some(code);
        }
        self
    }

    /// Adds feedback explaining why the previous attempt failed.
    pub fn with_feedback(mut self, feedback: impl IntoIterator<Item = String>) -> Self {
        self.feedback.extend(feedback);
        self
    }

    /// Builds the message.
    pub fn build(&self) -> String {
        if self.previous_code.is_none() && self.feedback.is_empty() {
            return self.user_prompt.clone();
        }

        let mut prompt = String::new();
        prompt.push_str(&self.user_prompt);
        prompt.push_str("\n\n");

        if let Some(code) = &self.previous_code {
            prompt.push_str("A previous attempt produced this code:\n\n");
            prompt.push_str(code);
            prompt.push_str("\n\n");
        }

        if !self.feedback.is_empty() {
            prompt.push_str("It was rejected for these reasons:\n");
            for item in &self.feedback {
                prompt.push_str("- ");
                prompt.push_str(item);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("Write a corrected version that addresses every point above.");
        prompt
    }
}

/// Builds the request for a sample-data script exercising `code`.
pub fn sample_data_prompt(code: &str, existing_test_data: &str) -> String {
    format!(
        "Generate simple test code for the following function.
IMPORTANT:
1. Return ONLY executable Python code
2. DO NOT include any text comments or descriptions
3. Use print statements for test output
4. Include basic assertions
5. Test both valid and invalid inputs
6. Test edge cases appropriate for the function type

Function to test:
{code}

Existing test data:
{existing_test_data}
"
    )
}

/// Builds the reviewer's user message.
pub fn review_message(code: &str, execution_report: &str) -> String {
    format!("Review the following Python code:\n\n{code}\n\nExecution result:\n{execution_report}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedent_removes_common_margin() {
        let text = "\n    Create a function that:\n      handles negatives\n    returns bool\n";
        assert_eq!(
            dedent(text),
            "\nCreate a function that:\n  handles negatives\nreturns bool\n"
        );
    }

    #[test]
    fn dedent_ignores_blank_lines_for_margin() {
        let text = "    a\n\n  \n    b";
        assert_eq!(dedent(text), "a\n\n\nb");
    }

    #[test]
    fn dedent_keeps_text_without_margin() {
        assert_eq!(dedent("a\n  b"), "a\n  b");
        assert_eq!(dedent(""), "");
    }

    #[test]
    fn dedent_handles_mixed_tabs_and_spaces() {
        assert_eq!(dedent("\t  a\n\t b"), " a\nb");
    }

    #[test]
    fn extract_test_data_reads_label_to_end() {
        let prompt = "Write is_palindrome.\nTEST DATA: 121, -121, 10";
        assert_eq!(extract_test_data(prompt), "121, -121, 10");
    }

    #[test]
    fn extract_test_data_reads_fenced_block() {
        let prompt = "Sort a list.\n```python\nsort([3, 1, 2])\n```\nThanks";
        assert_eq!(extract_test_data(prompt), "sort([3, 1, 2])");
    }

    #[test]
    fn extract_test_data_prefers_earlier_marker_kinds() {
        let prompt = "```python\nx\n```\nSAMPLE DATA: [1]";
        assert_eq!(extract_test_data(prompt), "[1]");
    }

    #[test]
    fn extract_test_data_unterminated_fence_runs_to_end() {
        assert_eq!(extract_test_data("```python\nf(1)"), "f(1)");
    }

    #[test]
    fn extract_test_data_returns_empty_without_markers() {
        assert_eq!(extract_test_data("just a request"), "");
    }

    #[test]
    fn generation_prompt_is_plain_on_first_attempt() {
        let prompt = GenerationPromptBuilder::new("write add").build();
        assert_eq!(prompt, "write add");
    }

    #[test]
    fn generation_prompt_includes_feedback_on_retry() {
        let prompt = GenerationPromptBuilder::new("write add")
            .with_previous_code("def add(a, b): return a - b")
            .with_feedback(vec!["AssertionError: 1 + 1 != 0".to_string()])
            .build();

        assert!(prompt.starts_with("write add"));
        assert!(prompt.contains("return a - b"));
        assert!(prompt.contains("- AssertionError: 1 + 1 != 0"));
        assert!(prompt.ends_with("addresses every point above."));
    }

    #[test]
    fn sample_data_prompt_embeds_code_and_data() {
        let prompt = sample_data_prompt("def f(x): pass", "f(1)");
        assert!(prompt.contains("Function to test:\ndef f(x): pass"));
        assert!(prompt.contains("Existing test data:\nf(1)"));
    }

    #[test]
    fn review_message_includes_report() {
        let message = review_message("def f(): pass", "Status: ok");
        assert!(message.starts_with("Review the following Python code:\n\ndef f(): pass"));
        assert!(message.contains("Execution result:\nStatus: ok"));
    }
}
