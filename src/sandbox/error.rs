//! Domain-specific error types for sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings.

use std::time::Duration;

/// Errors that can occur while talking to a sandbox or its control plane.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// A sandbox-scoped operation was attempted before `attach`.
    #[error("No sandbox attached to the client")]
    NotAttached,

    /// The control plane answered with a non-success status.
    #[error("Sandbox API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (DNS, connect, TLS, decode).
    #[error("Sandbox transport error: {message}")]
    Transport { message: String },

    /// A remote command exceeded its timeout.
    #[error("Remote command timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// A remote command ran but exited non-zero.
    #[error("Remote command `{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i64,
        stderr: String,
    },

    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },
}

impl SandboxError {
    /// Creates an `Api` error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a `Transport` error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error from a `Duration`.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a `CommandFailed` error.
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i64,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into().trim().to_string(),
        }
    }

    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Returns true if this is a timeout error.
    #[allow(dead_code)] // Public API for callers
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if a remote command exited non-zero.
    #[allow(dead_code)] // Public API for callers
    pub fn is_command_failed(&self) -> bool {
        matches!(self, Self::CommandFailed { .. })
    }

    /// Returns true if the control plane rejected the request.
    #[allow(dead_code)] // Public API for callers
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}
