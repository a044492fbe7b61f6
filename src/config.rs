//! Pipeline configuration and validation.
//!
//! Configuration is layered: built-in defaults, then an optional TOML or
//! YAML file, then the `ANTHROPIC_LARGE_MODEL` / `ANTHROPIC_SMALL_MODEL`
//! environment variables. Validation runs before any hosted service is
//! contacted so bad settings fail fast.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the generation model.
pub const LARGE_MODEL_ENV: &str = "ANTHROPIC_LARGE_MODEL";

/// Environment variable overriding the sample-data and review model.
pub const SMALL_MODEL_ENV: &str = "ANTHROPIC_SMALL_MODEL";

/// Default model for code generation.
pub const DEFAULT_LARGE_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default model for sample data and review.
pub const DEFAULT_SMALL_MODEL: &str = "claude-3-5-haiku-20241022";

/// Model selection and sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used by the generator stage.
    #[serde(default = "default_large_model")]
    pub large: String,
    /// Model used by the sample-data and review stages.
    #[serde(default = "default_small_model")]
    pub small: String,
    /// Maximum output tokens per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_large_model() -> String {
    DEFAULT_LARGE_MODEL.to_string()
}

fn default_small_model() -> String {
    DEFAULT_SMALL_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            large: default_large_model(),
            small: default_small_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Anthropic API endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Base URL of the Messages API.
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
    /// Value of the `anthropic-version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_url(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AnthropicConfig {
    /// Request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// E2B sandbox settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base URL of the E2B control API.
    #[serde(default = "default_e2b_api_url")]
    pub api_url: String,
    /// Domain sandboxes are served under.
    #[serde(default = "default_e2b_domain")]
    pub domain: String,
    /// Sandbox template to boot.
    #[serde(default = "default_template")]
    pub template: String,
    /// Port of the code interpreter inside the sandbox.
    #[serde(default = "default_interpreter_port")]
    pub interpreter_port: u16,
    /// Sandbox lifetime in seconds before E2B reaps it.
    #[serde(default = "default_sandbox_timeout")]
    pub timeout_secs: u64,
    /// Per-request timeout in seconds (covers code execution).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Fixed host to reach the sandbox at, bypassing `{port}-{id}.{domain}`.
    #[serde(default)]
    pub host_override: Option<String>,
}

fn default_e2b_api_url() -> String {
    "https://api.e2b.app".to_string()
}

fn default_e2b_domain() -> String {
    "e2b.app".to_string()
}

fn default_template() -> String {
    "code-interpreter-v1".to_string()
}

fn default_interpreter_port() -> u16 {
    49999
}

fn default_sandbox_timeout() -> u64 {
    300
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            api_url: default_e2b_api_url(),
            domain: default_e2b_domain(),
            template: default_template(),
            interpreter_port: default_interpreter_port(),
            timeout_secs: default_sandbox_timeout(),
            request_timeout_secs: default_request_timeout(),
            host_override: None,
        }
    }
}

impl SandboxConfig {
    /// Base URL of a running sandbox's code interpreter.
    pub fn sandbox_host(&self, sandbox_id: &str) -> String {
        match &self.host_override {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}-{}.{}",
                self.interpreter_port, sandbox_id, self.domain
            ),
        }
    }

    /// Request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Packaging output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory packaged modules are written under.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated_modules")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Generation attempts allowed; 1 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Model configuration.
    #[serde(default)]
    pub models: ModelsConfig,
    /// Anthropic endpoint configuration.
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    /// Sandbox configuration.
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            models: ModelsConfig::default(),
            anthropic: AnthropicConfig::default(),
            sandbox: SandboxConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a `.toml`, `.yaml` or `.yml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {}", path.display(), e))
            }),
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {}", path.display(), e))
            }),
            _ => Err(Error::Config(format!(
                "unsupported config format: {} (expected .toml, .yaml or .yml)",
                path.display()
            ))),
        }
    }

    /// Applies model overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies model overrides from an arbitrary variable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup(LARGE_MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.models.large = model;
        }
        if let Some(model) = lookup(SMALL_MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.models.small = model;
        }
        self
    }
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

fn check_url(result: &mut ValidationResult, field: &str, url: &str) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        result.add_error(format!("{} must be an http(s) URL, got '{}'", field, url));
    }
}

impl Validate for ModelsConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.large.trim().is_empty() {
            result.add_error("models.large cannot be empty");
        }
        if self.small.trim().is_empty() {
            result.add_error("models.small cannot be empty");
        }
        if self.max_tokens == 0 {
            result.add_error("models.max_tokens must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            result.add_error("models.temperature must be between 0.0 and 1.0");
        }
        if self.max_tokens < 512 {
            result.add_warning("models.max_tokens below 512 may truncate generated code");
        }

        result
    }
}

impl Validate for SandboxConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        check_url(&mut result, "sandbox.api_url", &self.api_url);
        if let Some(host) = &self.host_override {
            check_url(&mut result, "sandbox.host_override", host);
        }
        if self.template.trim().is_empty() {
            result.add_error("sandbox.template cannot be empty");
        }
        if self.timeout_secs == 0 {
            result.add_error("sandbox.timeout_secs must be at least 1");
        }
        if self.request_timeout_secs > self.timeout_secs {
            result.add_warning(
                "sandbox.request_timeout_secs exceeds the sandbox lifetime - it may be reaped mid-run",
            );
        }

        result
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.max_attempts == 0 {
            result.add_error("max_attempts must be at least 1");
        }
        if self.max_attempts > 10 {
            result.add_warning("max_attempts > 10 may lead to excessive LLM calls");
        }

        check_url(&mut result, "anthropic.base_url", &self.anthropic.base_url);
        if self.anthropic.request_timeout_secs == 0 {
            result.add_error("anthropic.request_timeout_secs must be at least 1");
        }

        if self.output.dir.as_os_str().is_empty() {
            result.add_error("output.dir cannot be empty");
        }

        result.merge(self.models.validate());
        result.merge(self.sandbox.validate());
        result
    }
}
