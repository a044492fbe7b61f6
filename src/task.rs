//! Task file loading.
//!
//! A task file is a YAML description of one generation request, so prompts
//! with embedded test data can be kept alongside a project.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A code generation request read from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenTask {
    /// Task name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Prompt sent to the generator.
    pub prompt: String,
    /// Sample inputs appended to the prompt.
    #[serde(default)]
    pub test_data: Option<String>,
    /// Overrides the configured attempt limit.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl CodegenTask {
    /// Loads a task from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| Error::Config(format!("failed to parse task {}: {}", path.display(), e)))
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// The prompt with any test data appended under `TEST DATA:`.
    pub fn full_prompt(&self) -> String {
        match self.test_data.as_deref().map(str::trim) {
            Some(data) if !data.is_empty() => {
                format!("{}\n\nTEST DATA: {}", self.prompt.trim_end(), data)
            }
            _ => self.prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::extract_test_data;
    use tempfile::TempDir;

    #[test]
    fn task_parses_minimal_yaml() {
        let task = CodegenTask::from_yaml("name: add\nprompt: Add two numbers.\n").unwrap();

        assert_eq!(task.name, "add");
        assert_eq!(task.prompt, "Add two numbers.");
        assert!(task.description.is_empty());
        assert_eq!(task.test_data, None);
        assert_eq!(task.max_attempts, None);
        assert_eq!(task.full_prompt(), "Add two numbers.");
    }

    #[test]
    fn task_appends_test_data_to_prompt() {
        let yaml = r#"
name: palindrome
description: "Integer palindromes"
prompt: |
  Write is_palindrome(n) for integers.
test_data: "121, -121, 10"
max_attempts: 3
"#;
        let task = CodegenTask::from_yaml(yaml).unwrap();

        assert_eq!(task.max_attempts, Some(3));
        let prompt = task.full_prompt();
        assert_eq!(prompt, "Write is_palindrome(n) for integers.\n\nTEST DATA: 121, -121, 10");
        assert_eq!(extract_test_data(&prompt), "121, -121, 10");
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task.yaml");
        std::fs::write(&path, "name: [unterminated").unwrap();

        let err = CodegenTask::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("task.yaml")));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = CodegenTask::load("/nonexistent/task.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
