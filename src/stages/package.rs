//! Packager stage: writes approved code out as an installable module.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use crate::state::{PackageInfo, PipelineState};

use super::{Stage, StageName};

/// Directories tried per timestamp before giving up.
const MAX_NAME_SUFFIX: u32 = 100;

/// Contents of a packaged module's `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub run_id: String,
    pub module_name: String,
    pub prompt: String,
    pub generation_model: String,
    pub review_model: String,
    pub attempts: u32,
    pub created_at: String,
}

/// Produces `package_info`.
pub struct Packager {
    output_dir: PathBuf,
    models: ModelsConfig,
}

impl Packager {
    /// Creates a packager writing modules under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, models: ModelsConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            models,
        }
    }

    fn write(path: &Path, contents: &str) -> Result<()> {
        tracing::debug!(path = ?path, bytes = contents.len(), "writing package file");
        std::fs::write(path, contents).map_err(|e| Error::Packaging {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Creates a fresh `generated_module_<timestamp>` directory.
    ///
    /// Runs packaged within the same second get a numeric suffix instead of
    /// sharing a directory.
    fn create_module_dir(&self, timestamp: &str) -> Result<(String, PathBuf)> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| Error::Packaging {
            path: self.output_dir.clone(),
            reason: e.to_string(),
        })?;

        let base = format!("generated_module_{}", timestamp);
        for suffix in 0..MAX_NAME_SUFFIX {
            let module_name = match suffix {
                0 => base.clone(),
                n => format!("{}_{}", base, n),
            };
            let module_path = self.output_dir.join(&module_name);
            match std::fs::create_dir(&module_path) {
                Ok(()) => return Ok((module_name, module_path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Error::Packaging {
                        path: module_path,
                        reason: e.to_string(),
                    })
                }
            }
        }

        Err(Error::Packaging {
            path: self.output_dir.join(base),
            reason: format!("{} modules already exist for this timestamp", MAX_NAME_SUFFIX),
        })
    }

    /// Writes the module for `state` using `timestamp` in its names.
    fn package(&self, state: &PipelineState, timestamp: &str) -> Result<PackageInfo> {
        let (module_name, module_path) = self.create_module_dir(timestamp)?;

        let mut code = state.generated_code.clone();
        if !code.ends_with('\n') {
            code.push('\n');
        }

        let standalone_file = module_path.join(format!("code_generated_{}.py", timestamp));
        Self::write(&standalone_file, &code)?;

        let init_file = module_path.join("__init__.py");
        Self::write(&init_file, &code)?;

        let setup_file = module_path.join("setup.py");
        Self::write(&setup_file, &setup_py(&module_name))?;

        let metadata = PackageMetadata {
            run_id: state.run_id.clone(),
            module_name: module_name.clone(),
            prompt: state.prompt.clone(),
            generation_model: self.models.large.clone(),
            review_model: self.models.small.clone(),
            attempts: state.attempts,
            created_at: chrono::Local::now().to_rfc3339(),
        };
        let metadata_file = module_path.join("metadata.json");
        Self::write(&metadata_file, &serde_json::to_string_pretty(&metadata)?)?;

        Ok(PackageInfo {
            module_name,
            module_path,
            standalone_file,
            init_file,
            setup_file,
            metadata_file,
        })
    }
}

/// setuptools script for a generated module.
fn setup_py(module_name: &str) -> String {
    format!(
        r#"
from setuptools import setup, find_packages

setup(
    name="{module_name}",
    version="0.1.0",
    packages=find_packages(),
    description="Generated Python module",
)
"#
    )
}

#[async_trait]
impl Stage for Packager {
    fn name(&self) -> StageName {
        StageName::Package
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        tracing::info!(output_dir = ?self.output_dir, "packaging code");

        let info = self.package(state, &timestamp)?;

        tracing::info!(module_path = ?info.module_path, "code packaging complete");
        state.package_info = Some(info);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn approved_state() -> PipelineState {
        let mut state = PipelineState::new("check palindromes");
        state.generated_code = "def is_palindrome(n):\n    return str(n) == str(n)[::-1]".to_string();
        state.attempts = 1;
        state
    }

    #[test]
    fn package_writes_module_layout() {
        let dir = TempDir::new().unwrap();
        let packager = Packager::new(dir.path(), ModelsConfig::default());
        let state = approved_state();

        let info = packager.package(&state, "20241107_104136").unwrap();

        assert_eq!(info.module_name, "generated_module_20241107_104136");
        assert_eq!(info.module_path, dir.path().join("generated_module_20241107_104136"));
        assert_eq!(
            info.standalone_file.file_name().unwrap(),
            "code_generated_20241107_104136.py"
        );

        let code = std::fs::read_to_string(&info.standalone_file).unwrap();
        assert!(code.starts_with("def is_palindrome(n):"));
        assert!(code.ends_with('\n'));
        assert_eq!(std::fs::read_to_string(&info.init_file).unwrap(), code);

        let setup = std::fs::read_to_string(&info.setup_file).unwrap();
        assert!(setup.contains("name=\"generated_module_20241107_104136\""));
        assert!(setup.contains("version=\"0.1.0\""));
    }

    #[test]
    fn package_writes_metadata() {
        let dir = TempDir::new().unwrap();
        let packager = Packager::new(dir.path(), ModelsConfig::default());
        let state = approved_state();

        let info = packager.package(&state, "20240101_000000").unwrap();

        let metadata: PackageMetadata =
            serde_json::from_str(&std::fs::read_to_string(&info.metadata_file).unwrap()).unwrap();
        assert_eq!(metadata.run_id, state.run_id);
        assert_eq!(metadata.prompt, "check palindromes");
        assert_eq!(metadata.generation_model, crate::config::DEFAULT_LARGE_MODEL);
        assert_eq!(metadata.attempts, 1);
    }

    #[test]
    fn package_never_reuses_a_module_dir() {
        let dir = TempDir::new().unwrap();
        let packager = Packager::new(dir.path(), ModelsConfig::default());
        let mut first_state = approved_state();
        first_state.generated_code = "def first():\n    return 1".to_string();
        let second_state = approved_state();

        let first = packager.package(&first_state, "20240101_000000").unwrap();
        let second = packager.package(&second_state, "20240101_000000").unwrap();

        assert_eq!(first.module_name, "generated_module_20240101_000000");
        assert_eq!(second.module_name, "generated_module_20240101_000000_1");
        assert_ne!(first.module_path, second.module_path);
        assert!(std::fs::read_to_string(&first.init_file)
            .unwrap()
            .starts_with("def first():"));
        assert!(std::fs::read_to_string(&second.setup_file)
            .unwrap()
            .contains("name=\"generated_module_20240101_000000_1\""));
    }

    #[test]
    fn package_fails_when_output_dir_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, "not a directory").unwrap();

        let packager = Packager::new(&blocker, ModelsConfig::default());
        let err = packager.package(&approved_state(), "20240101_000000").unwrap_err();

        assert!(matches!(err, Error::Packaging { .. }));
    }

    #[tokio::test]
    async fn run_records_package_info() {
        let dir = TempDir::new().unwrap();
        let packager = Packager::new(dir.path(), ModelsConfig::default());
        let mut state = approved_state();

        packager.run(&mut state).await.unwrap();

        let info = state.package_info.unwrap();
        assert!(info.module_path.is_dir());
        assert!(info.module_name.starts_with("generated_module_"));
    }
}
