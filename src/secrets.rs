//! API credential resolution and redaction.
//!
//! Credentials for the hosted services are resolved once at startup and
//! scrubbed from any error text the pipeline surfaces.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding the E2B API key.
pub const E2B_API_KEY: &str = "E2B_API_KEY";

/// Where a secret value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretSource {
    /// Read from an environment variable.
    EnvVar(String),
    /// Read from a file (trimmed).
    File(String),
    /// Provided directly (tests and embedding).
    Direct(String),
}

/// A named secret and its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretRef {
    /// Name of the secret.
    pub name: String,
    /// Source of the secret value.
    pub source: SecretSource,
}

impl SecretRef {
    /// Secret read from the environment variable of the same name.
    pub fn env(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: SecretSource::EnvVar(name.to_string()),
        }
    }
}

/// Holds resolved secrets and redacts them from text.
#[derive(Debug, Default, Clone)]
pub struct SecretsManager {
    secrets: HashMap<String, String>,
}

impl SecretsManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a secret from its source and stores it.
    pub fn load_secret(&mut self, secret_ref: &SecretRef) -> Result<&str> {
        let value = match &secret_ref.source {
            SecretSource::EnvVar(var_name) => env::var(var_name).map_err(|_| {
                Error::MissingCredential(format!("environment variable '{}' not set", var_name))
            })?,
            SecretSource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| {
                    Error::MissingCredential(format!("cannot read file '{}': {}", path, e))
                })?
                .trim()
                .to_string(),
            SecretSource::Direct(value) => value.clone(),
        };

        if value.trim().is_empty() {
            return Err(Error::MissingCredential(format!(
                "secret '{}' is empty",
                secret_ref.name
            )));
        }

        self.secrets.insert(secret_ref.name.clone(), value);
        Ok(self.secrets[&secret_ref.name].as_str())
    }

    /// Replaces every known secret value with `[REDACTED:<name>]`.
    pub fn redact(&self, text: &str) -> String {
        let mut ordered: Vec<(&String, &String)> = self.secrets.iter().collect();
        // longer values first so overlapping secrets are fully masked
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let mut result = text.to_string();
        for (name, value) in ordered {
            result = result.replace(value.as_str(), &format!("[REDACTED:{}]", name));
        }
        result
    }
}

/// API keys needed by the pipeline's hosted services.
#[derive(Clone)]
pub struct Credentials {
    /// Anthropic Messages API key.
    pub anthropic_api_key: String,
    /// E2B sandbox API key.
    pub e2b_api_key: String,
    secrets: SecretsManager,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("anthropic_api_key", &"[REDACTED]")
            .field("e2b_api_key", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Resolves both keys from `ANTHROPIC_API_KEY` and `E2B_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::resolve(&SecretRef::env(ANTHROPIC_API_KEY), &SecretRef::env(E2B_API_KEY))
    }

    /// Resolves both keys from arbitrary sources.
    pub fn resolve(anthropic: &SecretRef, e2b: &SecretRef) -> Result<Self> {
        let mut secrets = SecretsManager::new();
        let anthropic_api_key = secrets.load_secret(anthropic)?.to_string();
        let e2b_api_key = secrets.load_secret(e2b)?.to_string();
        Ok(Self {
            anthropic_api_key,
            e2b_api_key,
            secrets,
        })
    }

    /// Builds credentials from literal values.
    pub fn direct(anthropic_api_key: impl Into<String>, e2b_api_key: impl Into<String>) -> Result<Self> {
        Self::resolve(
            &SecretRef {
                name: ANTHROPIC_API_KEY.to_string(),
                source: SecretSource::Direct(anthropic_api_key.into()),
            },
            &SecretRef {
                name: E2B_API_KEY.to_string(),
                source: SecretSource::Direct(e2b_api_key.into()),
            },
        )
    }

    /// Manager able to redact these keys.
    pub fn secrets(&self) -> &SecretsManager {
        &self.secrets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn direct_secret_is_loaded_and_redacted() {
        let mut manager = SecretsManager::new();
        let value = manager
            .load_secret(&SecretRef {
                name: "API_KEY".to_string(),
                source: SecretSource::Direct("sk-secret-123".to_string()),
            })
            .unwrap();

        assert_eq!(value, "sk-secret-123");
        assert_eq!(
            manager.redact("auth failed for sk-secret-123"),
            "auth failed for [REDACTED:API_KEY]"
        );
    }

    #[test]
    fn file_secret_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key");
        std::fs::write(&path, "  file-key\n").unwrap();

        let mut manager = SecretsManager::new();
        let value = manager
            .load_secret(&SecretRef {
                name: "KEY".to_string(),
                source: SecretSource::File(path.to_string_lossy().to_string()),
            })
            .unwrap();
        assert_eq!(value, "file-key");
    }

    #[test]
    fn missing_env_var_is_a_missing_credential() {
        let mut manager = SecretsManager::new();
        let err = manager
            .load_secret(&SecretRef::env("CODEGEN_PIPELINE_TEST_UNSET_VAR"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut manager = SecretsManager::new();
        let err = manager
            .load_secret(&SecretRef {
                name: "EMPTY".to_string(),
                source: SecretSource::Direct("   ".to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }

    #[test]
    fn overlapping_secrets_redact_longest_first() {
        let creds = Credentials::direct("abc", "abcdef").unwrap();
        let redacted = creds.secrets().redact("key=abcdef");
        assert_eq!(redacted, "key=[REDACTED:E2B_API_KEY]");
    }

    #[test]
    fn credentials_debug_hides_keys() {
        let creds = Credentials::direct("sk-ant-xyz", "e2b-xyz").unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("sk-ant-xyz"));
        assert!(!debug.contains("e2b-xyz"));
    }
}
