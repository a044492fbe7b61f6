//! E2B code-interpreter sandbox.
//!
//! The sandbox is created lazily on the first [`CodeSandbox::run_code`]
//! call and reused until [`CodeSandbox::cleanup`] kills it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::backoff::PollBackoff;
use crate::config::SandboxConfig;
use crate::error::{Error, Result};
use crate::state::{ExecutionError, ExecutionResult};

use super::CodeSandbox;

/// A live sandbox.
#[derive(Debug, Clone)]
struct Session {
    sandbox_id: String,
    host: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateSandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
    #[serde(rename = "envdAccessToken", default)]
    envd_access_token: Option<String>,
}

/// One line of the interpreter's streamed output.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ExecutionEvent {
    Stdout {
        text: String,
    },
    Stderr {
        text: String,
    },
    Result {
        #[serde(default)]
        text: Option<String>,
    },
    Error {
        name: String,
        value: String,
        #[serde(default)]
        traceback: String,
    },
    EndOfExecution,
    #[serde(other)]
    Other,
}

/// Sandbox backed by the E2B API.
pub struct E2bSandbox {
    config: SandboxConfig,
    api_key: String,
    client: reqwest::Client,
    backoff: PollBackoff,
    session: Mutex<Option<Session>>,
}

impl E2bSandbox {
    /// Creates a sandbox client; no remote sandbox exists until code runs.
    pub fn new(config: SandboxConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
            backoff: PollBackoff::default(),
            session: Mutex::new(None),
        })
    }

    /// Overrides the readiness polling schedule.
    pub fn with_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// ID of the live sandbox, if one has been created.
    pub async fn sandbox_id(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.sandbox_id.clone())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn create_session(&self) -> Result<Session> {
        let response = self
            .client
            .post(self.api_url("/sandboxes"))
            .header("X-API-KEY", &self.api_key)
            .json(&json!({
                "templateID": self.config.template,
                "timeout": self.config.timeout_secs,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: "e2b",
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let created: CreateSandboxResponse = response.json().await?;
        let host = self.config.sandbox_host(&created.sandbox_id);
        tracing::info!(sandbox_id = %created.sandbox_id, template = %self.config.template, "created E2B sandbox");

        Ok(Session {
            sandbox_id: created.sandbox_id,
            host,
            access_token: created.envd_access_token,
        })
    }

    async fn wait_until_ready(&self, session: &Session) -> Result<()> {
        let mut backoff = self.backoff.clone();
        let url = format!("{}/health", session.host);

        loop {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    tracing::debug!(status = response.status().as_u16(), "sandbox not ready")
                }
                Err(e) => tracing::debug!(error = %e, "sandbox not reachable yet"),
            }

            match backoff.next_delay() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    return Err(Error::Sandbox(format!(
                        "sandbox {} not ready after {} polls",
                        session.sandbox_id,
                        backoff.polls()
                    )))
                }
            }
        }
    }

    async fn execute(&self, session: &Session, code: &str) -> Result<ExecutionResult> {
        let mut request = self
            .client
            .post(format!("{}/execute", session.host))
            .json(&json!({ "code": code, "language": "python" }));
        if let Some(token) = &session.access_token {
            request = request.header("X-Access-Token", token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                service: "e2b",
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        Ok(parse_execution_output(&body))
    }

    async fn kill(&self, session: &Session) -> Result<()> {
        let response = self
            .client
            .delete(self.api_url(&format!("/sandboxes/{}", session.sandbox_id)))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        // 404: already reaped by its timeout
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            Err(Error::Api {
                service: "e2b",
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Folds newline-delimited interpreter events into an [`ExecutionResult`].
fn parse_execution_output(body: &str) -> ExecutionResult {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut results = Vec::new();
    let mut error = None;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<ExecutionEvent>(line) {
            Ok(ExecutionEvent::Stdout { text }) => stdout.push(text),
            Ok(ExecutionEvent::Stderr { text }) => stderr.push(text),
            Ok(ExecutionEvent::Result { text: Some(text) }) => results.push(text),
            Ok(ExecutionEvent::Error {
                name,
                value,
                traceback,
            }) => {
                error = Some(ExecutionError {
                    name,
                    value,
                    traceback,
                })
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, line = %line, "skipping malformed execution event"),
        }
    }

    ExecutionResult::from_parts(stdout, stderr, results, error)
}

#[async_trait]
impl CodeSandbox for E2bSandbox {
    async fn run_code(&self, code: &str) -> Result<ExecutionResult> {
        let mut guard = self.session.lock().await;

        let session = match guard.as_ref() {
            Some(session) => session.clone(),
            None => {
                let session = self.create_session().await?;
                if let Err(e) = self.wait_until_ready(&session).await {
                    // never cached, so cleanup would not reach it
                    if let Err(kill_err) = self.kill(&session).await {
                        tracing::warn!(sandbox_id = %session.sandbox_id, error = %kill_err, "failed to kill unready sandbox");
                    }
                    return Err(e);
                }
                *guard = Some(session.clone());
                session
            }
        };

        tracing::info!(sandbox_id = %session.sandbox_id, bytes = code.len(), "executing code in sandbox");
        let result = self.execute(&session, code).await?;
        tracing::info!(sandbox_id = %session.sandbox_id, success = result.success, "sandbox execution complete");
        Ok(result)
    }

    async fn cleanup(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };

        tracing::info!(sandbox_id = %session.sandbox_id, "cleaning up sandbox");
        if let Err(e) = self.kill(&session).await {
            tracing::warn!(sandbox_id = %session.sandbox_id, error = %e, "error during sandbox cleanup");
        }
    }

    fn name(&self) -> &str {
        "e2b"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sandbox_for(server: &MockServer) -> E2bSandbox {
        let config = SandboxConfig {
            api_url: server.uri(),
            host_override: Some(server.uri()),
            ..SandboxConfig::default()
        };
        E2bSandbox::new(config, "e2b-test")
            .unwrap()
            .with_backoff(PollBackoff::new(
                Duration::from_millis(1),
                Duration::from_millis(5),
                3,
            ))
    }

    async fn mount_create_and_health(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/sandboxes"))
            .and(header("X-API-KEY", "e2b-test"))
            .and(body_partial_json(json!({"templateID": "code-interpreter-v1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "sandboxID": "sbx-1",
                "templateID": "code-interpreter-v1",
                "clientID": "c",
                "envdAccessToken": "tok-1"
            })))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
    }

    #[test]
    fn parse_collects_streams_and_results() {
        let body = concat!(
            "{\"type\":\"stdout\",\"text\":\"hello\\n\",\"timestamp\":1}\n",
            "{\"type\":\"stderr\",\"text\":\"warn\\n\",\"timestamp\":2}\n",
            "{\"type\":\"result\",\"text\":\"42\",\"is_main_result\":true}\n",
            "{\"type\":\"number_of_executions\",\"execution_count\":1}\n",
            "{\"type\":\"end_of_execution\"}\n"
        );

        let result = parse_execution_output(body);
        assert!(result.success);
        assert_eq!(result.stdout, vec!["hello\n"]);
        assert_eq!(result.stderr, vec!["warn\n"]);
        assert_eq!(result.results, vec!["42"]);
    }

    #[test]
    fn parse_records_error_event() {
        let body = concat!(
            "{\"type\":\"stdout\",\"text\":\"before\\n\"}\n",
            "{\"type\":\"error\",\"name\":\"ZeroDivisionError\",\"value\":\"division by zero\",\"traceback\":\"Traceback...\"}\n",
            "not json\n"
        );

        let result = parse_execution_output(body);
        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error.name, "ZeroDivisionError");
        assert_eq!(error.value, "division by zero");
        assert_eq!(result.stdout, vec!["before\n"]);
    }

    #[tokio::test]
    async fn run_code_creates_sandbox_once_and_sends_token() {
        let server = MockServer::start().await;
        mount_create_and_health(&server).await;

        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(header("X-Access-Token", "tok-1"))
            .and(body_partial_json(json!({"language": "python"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"type\":\"stdout\",\"text\":\"True\\n\"}\n{\"type\":\"end_of_execution\"}\n",
            ))
            .expect(2)
            .mount(&server)
            .await;

        let sandbox = sandbox_for(&server);
        let first = sandbox.run_code("print(True)").await.unwrap();
        let second = sandbox.run_code("print(True)").await.unwrap();

        assert!(first.success);
        assert_eq!(second.stdout, vec!["True\n"]);
        assert_eq!(sandbox.sandbox_id().await.as_deref(), Some("sbx-1"));
    }

    #[tokio::test]
    async fn create_failure_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sandboxes"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = sandbox_for(&server).run_code("1").await.unwrap_err();
        match err {
            Error::Api { service, status, message } => {
                assert_eq!(service, "e2b");
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unready_sandbox_times_out_and_is_killed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sandboxes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sandboxID": "sbx-2"})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/sandboxes/sbx-2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let sandbox = sandbox_for(&server);
        let err = sandbox.run_code("1").await.unwrap_err();
        assert!(matches!(err, Error::Sandbox(ref m) if m.contains("not ready after 3 polls")));
        assert!(sandbox.sandbox_id().await.is_none());

        // a second attempt provisions and polls a fresh sandbox
        assert!(sandbox.run_code("1").await.is_err());
        assert!(sandbox.sandbox_id().await.is_none());
    }

    #[tokio::test]
    async fn cleanup_kills_sandbox_once() {
        let server = MockServer::start().await;
        mount_create_and_health(&server).await;

        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"type\":\"end_of_execution\"}\n"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/sandboxes/sbx-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sandbox = sandbox_for(&server);
        sandbox.run_code("pass").await.unwrap();
        sandbox.cleanup().await;
        sandbox.cleanup().await;

        assert!(sandbox.sandbox_id().await.is_none());
    }

    #[tokio::test]
    async fn cleanup_without_sandbox_is_noop() {
        let server = MockServer::start().await;
        let sandbox = sandbox_for(&server);
        sandbox.cleanup().await;
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
