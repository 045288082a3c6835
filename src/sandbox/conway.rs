//! Conway cloud control-plane client.
//!
//! Thin JSON-over-HTTPS adapter: every call maps to one request and every
//! non-success status becomes [`SandboxError::Api`].

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ExecOutput, RemoteCommand, SandboxClient, SandboxCreateRequest, SandboxError, SandboxInfo};

/// Extra time granted to the HTTP request on top of a command's own timeout.
const EXEC_GRACE: Duration = Duration::from_secs(5);

/// HTTP client for the Conway sandbox API.
#[derive(Debug, Clone)]
pub(crate) struct ConwayClient {
    http: Client,
    api_url: String,
    api_key: String,
    sandbox_id: Option<String>,
    exec_grace: Duration,
}

/// List responses arrive either bare or wrapped in `{"sandboxes": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SandboxList {
    Wrapped { sandboxes: Vec<SandboxInfo> },
    Bare(Vec<SandboxInfo>),
}

#[derive(Deserialize)]
struct ExecResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default, alias = "exitCode")]
    exit_code: i64,
}

#[derive(Deserialize)]
struct ReadResponse {
    content: String,
}

impl ConwayClient {
    /// Creates a client for `api_url`, authenticating with `api_key`.
    pub fn new(api_url: &str, api_key: &str, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SandboxError::transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            sandbox_id: None,
            exec_grace: EXEC_GRACE,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn sandbox_url(&self, suffix: &str) -> Result<String> {
        let id = self.sandbox_id.as_deref().ok_or(SandboxError::NotAttached)?;
        Ok(self.url(&format!("/v1/sandboxes/{id}{suffix}")))
    }

    /// Sends the request and maps transport failures and error statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.dispatch(request, None).await
    }

    /// Like [`Self::send`], but a client-side deadline on a request that
    /// carries a command becomes [`SandboxError::Timeout`].
    async fn dispatch(
        &self,
        request: RequestBuilder,
        command_timeout: Option<Duration>,
    ) -> Result<Response> {
        let response = request
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error(&e, command_timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SandboxError::api(status.as_u16(), body).into())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| SandboxError::transport(format!("invalid response body: {e}")))?;
        Ok(parsed)
    }
}

fn request_error(e: &reqwest::Error, command_timeout: Option<Duration>) -> SandboxError {
    match command_timeout {
        Some(timeout) if e.is_timeout() => SandboxError::timeout(timeout),
        _ if e.is_timeout() => SandboxError::transport(format!("request timed out: {e}")),
        _ => SandboxError::transport(e.to_string()),
    }
}

#[async_trait]
impl SandboxClient for ConwayClient {
    async fn list_sandboxes(&self) -> Result<Vec<SandboxInfo>> {
        let list: SandboxList = self
            .send_json(self.http.get(self.url("/v1/sandboxes")))
            .await?;
        Ok(match list {
            SandboxList::Wrapped { sandboxes } | SandboxList::Bare(sandboxes) => sandboxes,
        })
    }

    async fn create_sandbox(&self, request: &SandboxCreateRequest) -> Result<SandboxInfo> {
        let body = json!({
            "name": request.name,
            "vcpu": request.vcpu,
            "memory_mb": request.memory_mb,
            "disk_gb": request.disk_gb,
        });
        debug!("Creating Conway sandbox: {}", body);
        self.send_json(self.http.post(self.url("/v1/sandboxes")).json(&body))
            .await
    }

    async fn delete_sandbox(&self, sandbox_id: &str) -> Result<()> {
        self.send(
            self.http
                .delete(self.url(&format!("/v1/sandboxes/{sandbox_id}"))),
        )
        .await?;
        Ok(())
    }

    fn attach(&mut self, sandbox_id: &str) {
        self.sandbox_id = Some(sandbox_id.to_string());
    }

    fn attached(&self) -> Option<&str> {
        self.sandbox_id.as_deref()
    }

    async fn exec(&self, command: &RemoteCommand) -> Result<ExecOutput> {
        let url = self.sandbox_url("/exec")?;
        let body = json!({
            "command": command.to_shell(),
            "timeout": command.timeout_ms(),
        });
        debug!("Conway exec: {}", command);

        let request = self
            .http
            .post(url)
            .json(&body)
            .timeout(command.timeout_duration() + self.exec_grace);

        let response = match self
            .dispatch(request, Some(command.timeout_duration()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // 408 and 504 mean the command itself ran out of time.
                if let Some(SandboxError::Api { status: 408 | 504, .. }) =
                    e.downcast_ref::<SandboxError>()
                {
                    return Err(SandboxError::timeout(command.timeout_duration()).into());
                }
                return Err(e);
            }
        };

        let parsed: ExecResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SandboxError::timeout(command.timeout_duration())
            } else {
                SandboxError::transport(format!("invalid exec response: {e}"))
            }
        })?;

        Ok(ExecOutput {
            stdout: parsed.stdout,
            stderr: parsed.stderr,
            exit_code: parsed.exit_code,
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let url = self.sandbox_url("/files/upload/json")?;
        debug!("Conway write: {} ({} bytes)", path, content.len());
        self.send(
            self.http
                .post(url)
                .json(&json!({ "path": path, "content": content })),
        )
        .await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let url = self.sandbox_url("/files/read")?;
        let parsed: ReadResponse = self
            .send_json(self.http.get(url).query(&[("path", path)]))
            .await?;
        Ok(parsed.content)
    }
}
