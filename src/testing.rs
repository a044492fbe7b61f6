//! Scripted stand-ins for the hosted services, used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::sandbox::CodeSandbox;
use crate::state::ExecutionResult;

/// Model that replays canned responses in order and records requests.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Model("script exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Sandbox that replays canned results and records submitted programs.
pub struct ScriptedSandbox {
    results: Mutex<VecDeque<Result<ExecutionResult>>>,
    programs: Mutex<Vec<String>>,
    cleanups: AtomicUsize,
}

impl ScriptedSandbox {
    pub fn new(results: Vec<Result<ExecutionResult>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            programs: Mutex::new(Vec::new()),
            cleanups: AtomicUsize::new(0),
        }
    }

    /// Programs submitted so far.
    pub fn programs(&self) -> Vec<String> {
        self.programs.lock().unwrap().clone()
    }

    /// Number of times `cleanup` was called.
    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeSandbox for ScriptedSandbox {
    async fn run_code(&self, code: &str) -> Result<ExecutionResult> {
        self.programs.lock().unwrap().push(code.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Sandbox("script exhausted".to_string())))
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
