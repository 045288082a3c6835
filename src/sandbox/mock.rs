//! Mock sandbox client for testing.
//!
//! Keeps an in-memory fleet and file map, answers commands through a
//! configurable handler and records every call for test assertions.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ExecOutput, RemoteCommand, SandboxClient, SandboxCreateRequest, SandboxError, SandboxInfo};

type ExecHandler = dyn Fn(&RemoteCommand) -> ExecOutput + Send + Sync;

/// A mock sandbox client for testing.
#[derive(Clone)]
pub(crate) struct MockSandboxClient {
    sandboxes: Arc<Mutex<Vec<SandboxInfo>>>,
    created: Arc<Mutex<Vec<SandboxCreateRequest>>>,
    files: Arc<Mutex<HashMap<String, String>>>,
    execs: Arc<Mutex<Vec<RemoteCommand>>>,
    exec_handler: Arc<ExecHandler>,
    list_error: Option<String>,
    create_error: Option<String>,
    list_delay: Option<Duration>,
    attached: Option<String>,
}

impl MockSandboxClient {
    /// An empty fleet where every command succeeds with no output.
    pub fn new() -> Self {
        Self {
            sandboxes: Arc::new(Mutex::new(Vec::new())),
            created: Arc::new(Mutex::new(Vec::new())),
            files: Arc::new(Mutex::new(HashMap::new())),
            execs: Arc::new(Mutex::new(Vec::new())),
            exec_handler: Arc::new(|_| ExecOutput::default()),
            list_error: None,
            create_error: None,
            list_delay: None,
            attached: None,
        }
    }

    /// Seed the fleet returned by `list_sandboxes`.
    pub fn with_sandboxes(self, sandboxes: Vec<SandboxInfo>) -> Self {
        *self.sandboxes.lock().unwrap() = sandboxes;
        self
    }

    /// Answer every command with `handler`.
    pub fn with_exec_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RemoteCommand) -> ExecOutput + Send + Sync + 'static,
    {
        self.exec_handler = Arc::new(handler);
        self
    }

    /// Make `list_sandboxes` fail with an API error.
    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Make `create_sandbox` fail with an API error.
    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    /// Sleep after `list_sandboxes` reads the fleet so concurrent callers
    /// both act on the same stale snapshot.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Creation requests received so far.
    pub fn created(&self) -> Vec<SandboxCreateRequest> {
        self.created.lock().unwrap().clone()
    }

    /// Commands received so far.
    pub fn execs(&self) -> Vec<RemoteCommand> {
        self.execs.lock().unwrap().clone()
    }

    /// Rendered shell lines of the commands received so far.
    pub fn exec_lines(&self) -> Vec<String> {
        self.execs().iter().map(RemoteCommand::to_shell).collect()
    }

    /// Contents of a file written into the sandbox.
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Paths of all files written into the sandbox.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl SandboxClient for MockSandboxClient {
    async fn list_sandboxes(&self) -> Result<Vec<SandboxInfo>> {
        if let Some(ref message) = self.list_error {
            return Err(SandboxError::api(500, message.clone()).into());
        }
        // Snapshot before sleeping so a concurrent caller sees the same fleet.
        let snapshot = self.sandboxes.lock().unwrap().clone();
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn create_sandbox(&self, request: &SandboxCreateRequest) -> Result<SandboxInfo> {
        if let Some(ref message) = self.create_error {
            return Err(SandboxError::api(500, message.clone()).into());
        }

        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = if created.len() == 1 {
            "new-sandbox-id".to_string()
        } else {
            format!("new-sandbox-id-{}", created.len())
        };

        let info = SandboxInfo {
            id,
            status: "running".to_string(),
            region: "us-east".to_string(),
            vcpu: request.vcpu,
            memory_mb: request.memory_mb,
            disk_gb: request.disk_gb,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        self.sandboxes.lock().unwrap().push(info.clone());
        Ok(info)
    }

    async fn delete_sandbox(&self, sandbox_id: &str) -> Result<()> {
        self.sandboxes.lock().unwrap().retain(|s| s.id != sandbox_id);
        Ok(())
    }

    fn attach(&mut self, sandbox_id: &str) {
        self.attached = Some(sandbox_id.to_string());
    }

    fn attached(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    async fn exec(&self, command: &RemoteCommand) -> Result<ExecOutput> {
        self.execs.lock().unwrap().push(command.clone());
        Ok((self.exec_handler)(command))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        self.file(path)
            .ok_or_else(|| SandboxError::command_failed(format!("cat {path}"), 1, "No such file").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SandboxCreateRequest {
        SandboxCreateRequest {
            name: "test".to_string(),
            vcpu: 1,
            memory_mb: 512,
            disk_gb: 5,
        }
    }

    #[tokio::test]
    async fn test_created_sandboxes_become_visible() {
        let client = MockSandboxClient::new();
        let first = client.create_sandbox(&request()).await.unwrap();
        let second = client.create_sandbox(&request()).await.unwrap();

        assert_eq!(first.id, "new-sandbox-id");
        assert_eq!(second.id, "new-sandbox-id-2");
        assert_eq!(client.list_sandboxes().await.unwrap().len(), 2);
        assert_eq!(client.created().len(), 2);
    }

    #[tokio::test]
    async fn test_files_roundtrip() {
        let client = MockSandboxClient::new();
        client.write_file("/root/a.md", "content").await.unwrap();
        assert_eq!(client.read_file("/root/a.md").await.unwrap(), "content");
        assert!(client.read_file("/root/missing.md").await.is_err());
    }

    #[tokio::test]
    async fn test_records_execs() {
        let client = MockSandboxClient::new().with_exec_handler(|_| ExecOutput::ok("done"));
        let output = client.exec(&RemoteCommand::new("true")).await.unwrap();
        assert_eq!(output.stdout, "done");
        assert_eq!(client.exec_lines(), vec!["true".to_string()]);
    }

    #[test]
    fn test_attach() {
        let mut client = MockSandboxClient::new();
        assert!(client.attached().is_none());
        client.attach("sb-1");
        assert_eq!(client.attached(), Some("sb-1"));
    }
}
