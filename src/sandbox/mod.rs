//! Remote sandbox capability.
//!
//! Everything the rest of the crate needs from a sandbox control plane goes
//! through [`SandboxClient`]: listing and creating sandboxes, and running
//! commands or reading and writing files inside the attached one.
//!
//! Two backends exist: the Conway HTTP API and a local Docker daemon.

mod command;
mod conway;
mod docker;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub(crate) use command::{ExecOutput, RemoteCommand, LONG_TIMEOUT, SHORT_TIMEOUT};
pub(crate) use conway::ConwayClient;
pub(crate) use docker::DockerClient;
pub use error::SandboxError;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a sandbox as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub vcpu: u32,
    #[serde(default, alias = "memoryMb")]
    pub memory_mb: u32,
    #[serde(default, alias = "diskGb")]
    pub disk_gb: u32,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

impl SandboxInfo {
    /// Status compared case-insensitively against `running`.
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }

    /// Creation time, if present and parseable as RFC 3339.
    pub fn created_at_parsed(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Parameters for a new sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxCreateRequest {
    pub name: String,
    pub vcpu: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
}

/// Control-plane capability consumed by provisioning, sync and versioning.
///
/// Sandbox-scoped operations (`exec`, `write_file`, `read_file`) act on the
/// sandbox selected with [`SandboxClient::attach`].
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Lists every sandbox visible to the caller's credentials.
    async fn list_sandboxes(&self) -> Result<Vec<SandboxInfo>>;

    /// Creates and starts a sandbox.
    async fn create_sandbox(&self, request: &SandboxCreateRequest) -> Result<SandboxInfo>;

    /// Deletes a sandbox.
    async fn delete_sandbox(&self, sandbox_id: &str) -> Result<()>;

    /// Selects the sandbox that later commands and file operations target.
    fn attach(&mut self, sandbox_id: &str);

    /// The currently attached sandbox, if any.
    fn attached(&self) -> Option<&str>;

    /// Runs a command and returns its output whatever the exit code.
    ///
    /// Transport failures and timeouts are errors; a non-zero exit is not.
    async fn exec(&self, command: &RemoteCommand) -> Result<ExecOutput>;

    /// Writes `content` to `path`, replacing any existing file.
    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// Reads the full contents of `path`.
    async fn read_file(&self, path: &str) -> Result<String>;
}

/// Runs a command and turns a non-zero exit into [`SandboxError::CommandFailed`].
pub(crate) async fn exec_checked<C>(client: &C, command: &RemoteCommand) -> Result<ExecOutput>
where
    C: SandboxClient + ?Sized,
{
    let output = client.exec(command).await?;
    if !output.success() {
        return Err(
            SandboxError::command_failed(command.to_shell(), output.exit_code, &output.stderr)
                .into(),
        );
    }
    Ok(output)
}
