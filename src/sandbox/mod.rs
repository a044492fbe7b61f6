//! Remote sandboxes for running untrusted generated code.
//!
//! This module provides the [`CodeSandbox`] trait and the [`E2bSandbox`]
//! implementation backed by the E2B code interpreter.

mod e2b;

pub use e2b::E2bSandbox;

use async_trait::async_trait;

use crate::error::Result;
use crate::state::ExecutionResult;

/// An isolated environment that runs Python code.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Runs `code` and collects its output.
    ///
    /// An `Err` means the sandbox could not run the code at all; code that
    /// raises is reported through [`ExecutionResult::error`].
    async fn run_code(&self, code: &str) -> Result<ExecutionResult>;

    /// Releases remote resources. Safe to call repeatedly.
    async fn cleanup(&self);

    /// Returns the name of this sandbox backend.
    fn name(&self) -> &str;
}
