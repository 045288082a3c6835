//! Structured remote commands.
//!
//! Commands are built from a program and an argument list and rendered to a
//! single shell line only at the transport boundary, with every word quoted.

use std::fmt;
use std::time::Duration;

/// Timeout for short probes and `git config`.
pub(crate) const SHORT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Timeout for directory creation, file sync and commits.
pub(crate) const LONG_TIMEOUT: Duration = Duration::from_millis(10_000);

/// A command to run inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<String>,
    timeout: Duration,
}

impl RemoteCommand {
    /// Creates a command with no arguments and the short timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: SHORT_TIMEOUT,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the command from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Overrides the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Timeout in whole milliseconds, as the control plane expects it.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Renders the command as one POSIX shell line.
    pub fn to_shell(&self) -> String {
        let line = shell_words::join(std::iter::once(self.program()).chain(
            self.arguments().iter().map(String::as_str),
        ));
        match self.working_dir() {
            Some(dir) => format!("cd {} && {line}", shell_words::quote(dir)),
            None => line,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell())
    }
}

/// Result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

impl ExecOutput {
    /// A successful result with the given stdout.
    #[cfg(test)]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// A failed result with the given exit code and stderr.
    #[cfg(test)]
    pub fn failed(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
