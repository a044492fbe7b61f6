//! Error types for the code generation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required credential could not be resolved.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// HTTP transport failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A hosted API answered with a non-success status.
    #[error("{service} API returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The language model produced an unusable response.
    #[error("model error: {0}")]
    Model(String),

    /// The remote sandbox could not be created or reached.
    #[error("sandbox error: {0}")]
    Sandbox(String),

    /// Generated code failed in the sandbox.
    #[error("code execution failed: {0}")]
    ExecutionFailed(String),

    /// The reviewer did not approve the generated code.
    #[error("code review rejected the generated code: {0}")]
    ReviewRejected(String),

    /// Writing the packaged module failed.
    #[error("failed to package module at {path}: {reason}")]
    Packaging { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
