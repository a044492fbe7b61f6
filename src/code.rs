//! Helpers for the Python source that flows through the pipeline.
//!
//! Model output is cleaned before it is executed, and the generated
//! function's signature is inspected to build a fallback smoke test.

use std::sync::OnceLock;

use regex::Regex;

static TOP_LEVEL_DEF: OnceLock<Regex> = OnceLock::new();
static DEF_HEADER: OnceLock<Regex> = OnceLock::new();
static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn top_level_def() -> &'static Regex {
    TOP_LEVEL_DEF.get_or_init(|| {
        Regex::new(r"(?m)^(?:async[ \t]+)?def[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(")
            .expect("valid top-level def regex")
    })
}

fn def_header() -> &'static Regex {
    DEF_HEADER.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(")
            .expect("valid def regex")
    })
}

fn identifier() -> &'static Regex {
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Lines that open Python code at module level.
const CODE_STARTS: &[&str] = &["def ", "async def ", "class ", "import ", "from "];

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Extracts code from a model response that may be wrapped in a markdown fence.
///
/// The response counts as wrapped only when it starts with a fence or a fence
/// line comes before the first module-level code line. Fences further down,
/// such as examples inside a docstring, are left alone and the trimmed
/// response is returned.
pub fn strip_code_fences(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();
    let fence = lines.iter().position(|line| is_fence(line));
    let first_code = lines
        .iter()
        .position(|line| CODE_STARTS.iter().any(|start| line.starts_with(start)));

    let open = match (fence, first_code) {
        (Some(f), Some(c)) if f < c => f,
        (Some(f), None) => f,
        _ => return response.trim().to_string(),
    };

    // the opening line carries the info string (```python)
    let body: Vec<&str> = lines[open + 1..]
        .iter()
        .take_while(|line| !is_fence(line))
        .copied()
        .collect();
    body.join("\n").trim_matches('\n').trim_end().to_string()
}

/// Cleans a model-written test script, keeping only code-like lines.
///
/// Blank lines and prose or comment lines (starting with `#`, `Here`,
/// `This` or `Note`) are dropped unless they print, assert, or open or
/// close a `try` block.
pub fn clean_generated_tests(test_code: &str) -> String {
    let unfenced = test_code.replace("```python", "").replace("```", "");
    unfenced
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            let is_code = !trimmed.is_empty()
                && !["#", "Here", "This", "Note"]
                    .iter()
                    .any(|prefix| trimmed.starts_with(prefix));
            is_code
                || line.contains("print")
                || line.contains("assert")
                || line.contains("try:")
                || line.contains("except")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cleans a test script immediately before execution.
///
/// Drops fences and any line starting with `#`, `Here`, `Test` or `This`
/// that does not print.
pub fn clean_tests_for_execution(test_code: &str) -> String {
    let unfenced = test_code.replace("```python", "").replace("```", "");
    unfenced
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            let prose = ["#", "Here", "Test", "This"]
                .iter()
                .any(|prefix| trimmed.starts_with(prefix));
            !prose || line.contains("print")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A positional parameter of a Python function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Annotation, when it is a plain name such as `int`.
    pub annotation: Option<String>,
}

/// Name and positional parameters of a Python function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Param>,
}

impl Default for FunctionSignature {
    fn default() -> Self {
        Self {
            name: "function".to_string(),
            params: Vec::new(),
        }
    }
}

/// Splits a parameter list on top-level commas.
fn split_params(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// Finds the function definition in `code`.
///
/// Module-level definitions win over methods and nested functions; an
/// indented `def` is used only when nothing is defined at column zero.
/// Only positional parameters are reported; parsing stops at `*args` or a
/// bare `*`. Falls back to a parameterless `function` when no definition
/// can be found.
pub fn analyze_function(code: &str) -> FunctionSignature {
    let Some(captures) = top_level_def()
        .captures(code)
        .or_else(|| def_header().captures(code))
    else {
        tracing::warn!("no function definition found in generated code");
        return FunctionSignature::default();
    };
    let name = captures[1].to_string();
    let Some(open) = captures.get(0).map(|m| m.end()) else {
        return FunctionSignature::default();
    };

    let mut depth = 1i32;
    let mut close = None;
    for (i, c) in code[open..].char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        tracing::warn!(function = %name, "unterminated parameter list");
        return FunctionSignature::default();
    };

    let mut params = Vec::new();
    for raw in split_params(&code[open..close]) {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" {
            continue;
        }
        if raw.starts_with('*') {
            break;
        }

        let without_default = raw.split('=').next().unwrap_or(raw);
        let (param_name, annotation) = match without_default.split_once(':') {
            Some((n, a)) => (n.trim(), Some(a.trim())),
            None => (without_default.trim(), None),
        };
        let annotation = annotation
            .filter(|a| identifier().is_match(a))
            .map(str::to_string);

        params.push(Param {
            name: param_name.to_string(),
            annotation,
        });
    }

    FunctionSignature { name, params }
}

/// Python literal used to exercise a parameter of the given annotation.
fn sample_value(annotation: Option<&str>) -> &'static str {
    match annotation {
        Some("int") => "0",
        Some("str") => "\"test\"",
        Some("float") => "0.0",
        Some("bool") => "True",
        Some("list") => "[]",
        Some("dict") => "{}",
        _ => "None",
    }
}

/// Builds a deterministic smoke test that calls the function once.
pub fn fallback_test(signature: &FunctionSignature) -> String {
    let mut values: Vec<&str> = signature
        .params
        .iter()
        .map(|p| sample_value(p.annotation.as_deref()))
        .collect();
    if values.is_empty() {
        values.push("0");
    }

    format!(
        "\nprint(\"Basic function test\")\nresult = {}({})\nprint(f\"Result: {{result}}\")\n",
        signature.name,
        values.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_extracts_block() {
        let response = "Here you go:\n```python\ndef f():\n    return 1\n```\nEnjoy";
        assert_eq!(strip_code_fences(response), "def f():\n    return 1");
    }

    #[test]
    fn strip_code_fences_passes_plain_code() {
        assert_eq!(strip_code_fences("\ndef f():\n    pass\n\n"), "def f():\n    pass");
    }

    #[test]
    fn strip_code_fences_handles_unterminated_fence() {
        assert_eq!(strip_code_fences("```\nx = 1\n"), "x = 1");
    }

    #[test]
    fn strip_code_fences_keeps_docstring_examples() {
        let code = "def render(md: str) -> str:\n    \"\"\"Render markdown.\n\n    ```python\n    render('x')\n    ```\n    \"\"\"\n    return md\n";
        assert_eq!(strip_code_fences(code), code.trim());
    }

    #[test]
    fn strip_code_fences_unwraps_block_with_docstring_fence() {
        let response = "```python\nimport re\n\ndef f():\n    \"\"\"Doc.\"\"\"\n    return 1\n```";
        assert_eq!(
            strip_code_fences(response),
            "import re\n\ndef f():\n    \"\"\"Doc.\"\"\"\n    return 1"
        );
    }

    #[test]
    fn clean_generated_tests_drops_prose_keeps_code() {
        let raw = "```python\nHere are the tests:\n# setup\nassert f(1)\n\nprint(f(2))\nNote: done\n```";
        assert_eq!(clean_generated_tests(raw), "assert f(1)\nprint(f(2))");
    }

    #[test]
    fn clean_generated_tests_keeps_commented_print() {
        let raw = "# print the result\nx = 1";
        assert_eq!(clean_generated_tests(raw), "# print the result\nx = 1");
    }

    #[test]
    fn clean_tests_for_execution_drops_test_prose() {
        let raw = "Test cases:\nTest_value = 3\nprint('Testing')\n# comment\nx = f(1)\n";
        assert_eq!(clean_tests_for_execution(raw), "print('Testing')\nx = f(1)");
    }

    #[test]
    fn clean_tests_for_execution_keeps_indented_code() {
        let raw = "try:\n    f(None)\nexcept TypeError:\n    print('ok')";
        assert_eq!(clean_tests_for_execution(raw), raw);
    }

    #[test]
    fn analyze_function_reads_annotations() {
        let code = "import math\n\ndef is_palindrome(number: int, strict: bool = False, data: list[int] = None) -> bool:\n    pass";
        let sig = analyze_function(code);

        assert_eq!(sig.name, "is_palindrome");
        assert_eq!(sig.params.len(), 3);
        assert_eq!(sig.params[0].annotation.as_deref(), Some("int"));
        assert_eq!(sig.params[1].annotation.as_deref(), Some("bool"));
        assert_eq!(sig.params[2].name, "data");
        assert_eq!(sig.params[2].annotation, None);
    }

    #[test]
    fn analyze_function_stops_at_varargs() {
        let sig = analyze_function("def f(a, b=(1, 2), *args, c: int = 1, **kw):\n    pass");
        let names: Vec<&str> = sig.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn analyze_function_handles_multiline_signature() {
        let code = "async def fetch(\n    url: str,\n    retries: int,\n):\n    pass";
        let sig = analyze_function(code);
        assert_eq!(sig.name, "fetch");
        assert_eq!(sig.params.len(), 2);
    }

    #[test]
    fn analyze_function_prefers_module_level_def() {
        let code = "class Helper:\n    def check(self, x):\n        return x\n\ndef is_palindrome(n: int) -> bool:\n    return Helper().check(str(n)) == str(n)[::-1]\n";
        let sig = analyze_function(code);

        assert_eq!(sig.name, "is_palindrome");
        assert_eq!(
            sig.params,
            vec![Param { name: "n".into(), annotation: Some("int".into()) }]
        );
        assert!(fallback_test(&sig).contains("result = is_palindrome(0)"));
    }

    #[test]
    fn analyze_function_ignores_def_in_docstring() {
        let code = "def outer(items: list):\n    \"\"\"Example:\n\n        def inner(x): ...\n    \"\"\"\n    return items\n";
        assert_eq!(analyze_function(code).name, "outer");
    }

    #[test]
    fn analyze_function_falls_back_to_indented_def() {
        let code = "class Stack:\n    def push(self, item):\n        pass\n";
        assert_eq!(analyze_function(code).name, "push");
    }

    #[test]
    fn analyze_function_defaults_without_def() {
        assert_eq!(analyze_function("x = 1"), FunctionSignature::default());
    }

    #[test]
    fn fallback_test_uses_typed_values() {
        let sig = FunctionSignature {
            name: "combine".to_string(),
            params: vec![
                Param { name: "a".into(), annotation: Some("int".into()) },
                Param { name: "b".into(), annotation: Some("str".into()) },
                Param { name: "c".into(), annotation: Some("Widget".into()) },
            ],
        };
        assert_eq!(
            fallback_test(&sig),
            "\nprint(\"Basic function test\")\nresult = combine(0, \"test\", None)\nprint(f\"Result: {result}\")\n"
        );
    }

    #[test]
    fn fallback_test_passes_zero_without_params() {
        let test = fallback_test(&FunctionSignature::default());
        assert!(test.contains("result = function(0)"));
    }
}
