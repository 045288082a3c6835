//! Local Docker backend.
//!
//! Each sandbox is a long-lived container labelled as managed by this tool.
//! Commands run through `docker exec`, files are written with a tar upload
//! and read back with `cat`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions, LogOutput,
    RemoveContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::ContainerSummary;
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashMap;
use tar::{Builder, Header};
use tracing::{debug, info, warn};

use super::{
    exec_checked, ExecOutput, RemoteCommand, SandboxClient, SandboxCreateRequest, SandboxError,
    SandboxInfo,
};

const MANAGED_LABEL: &str = "automaton.managed";
const NAME_LABEL: &str = "automaton.name";
const VCPU_LABEL: &str = "automaton.vcpu";
const MEMORY_LABEL: &str = "automaton.memory_mb";
const DISK_LABEL: &str = "automaton.disk_gb";

/// Sandboxes backed by containers on the local Docker daemon.
pub(crate) struct DockerClient {
    docker: Docker,
    image: String,
    container_id: Option<String>,
}

impl DockerClient {
    /// Connects to the local daemon; `image` is used for new sandboxes.
    pub async fn connect(image: &str) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

        Ok(Self {
            docker,
            image: image.to_string(),
            container_id: None,
        })
    }

    fn container(&self) -> Result<&str> {
        Ok(self
            .container_id
            .as_deref()
            .ok_or(SandboxError::NotAttached)?)
    }

    async fn run_exec(&self, container: &str, command: &RemoteCommand) -> Result<ExecOutput> {
        let shell = command.to_shell();
        let exec = self
            .docker
            .create_exec(
                container,
                CreateExecOptions {
                    cmd: Some(vec!["sh", "-c", shell.as_str()]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to create exec")?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached {
            output: mut stream, ..
        } = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .context("Failed to start exec")?
        {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Err(e) => {
                        warn!("Error reading exec output: {}", e);
                    }
                    _ => {}
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .context("Failed to inspect exec")?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: inspect.exit_code.unwrap_or(-1),
        })
    }
}

/// Builds a single-entry tarball placing `content` at absolute `path`.
fn tar_single_file(path: &str, content: &[u8]) -> Result<Bytes> {
    let mut buf = Vec::new();
    {
        let mut tar = Builder::new(&mut buf);
        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(
            u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        );
        header.set_cksum();
        tar.append_data(&mut header, path.trim_start_matches('/'), content)
            .with_context(|| format!("Failed to add {path} to tarball"))?;
        tar.finish().context("Failed to finalize tarball")?;
    }
    Ok(Bytes::from(buf))
}

/// Container name for a sandbox, reduced to Docker's `[a-zA-Z0-9_.-]` set.
///
/// The raw agent name is kept in [`NAME_LABEL`].
fn container_name(agent_name: &str, suffix: &str) -> String {
    let safe: String = agent_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("automaton-{safe}-{suffix}")
}

fn label_u32(labels: &HashMap<String, String>, key: &str) -> u32 {
    labels
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn summary_to_info(summary: ContainerSummary) -> Option<SandboxInfo> {
    let labels = summary.labels.unwrap_or_default();
    Some(SandboxInfo {
        id: summary.id?,
        status: summary.state.unwrap_or_else(|| "unknown".to_string()),
        region: "local".to_string(),
        vcpu: label_u32(&labels, VCPU_LABEL),
        memory_mb: label_u32(&labels, MEMORY_LABEL),
        disk_gb: label_u32(&labels, DISK_LABEL),
        created_at: summary
            .created
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339()),
    })
}

#[async_trait]
impl SandboxClient for DockerClient {
    async fn list_sandboxes(&self) -> Result<Vec<SandboxInfo>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{MANAGED_LABEL}=true")]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .context("Failed to list containers")?;

        Ok(containers.into_iter().filter_map(summary_to_info).collect())
    }

    async fn create_sandbox(&self, request: &SandboxCreateRequest) -> Result<SandboxInfo> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let container_name = container_name(&request.name, &suffix[..8]);

        let labels = HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (NAME_LABEL.to_string(), request.name.clone()),
            (VCPU_LABEL.to_string(), request.vcpu.to_string()),
            (MEMORY_LABEL.to_string(), request.memory_mb.to_string()),
            (DISK_LABEL.to_string(), request.disk_gb.to_string()),
        ]);

        let config = ContainerConfig {
            image: Some(self.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some("/root".to_string()),
            labels: Some(labels),
            host_config: Some(bollard::service::HostConfig {
                memory: Some(i64::from(request.memory_mb) * 1024 * 1024),
                nano_cpus: Some(i64::from(request.vcpu) * 1_000_000_000),
                ..Default::default()
            }),
            ..Default::default()
        };

        debug!("Creating container: {}", container_name);
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .context("Failed to create container")?;

        debug!("Starting container");
        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .context("Failed to start container")?;

        info!("Started sandbox container {}", container_name);
        Ok(SandboxInfo {
            id: created.id,
            status: "running".to_string(),
            region: "local".to_string(),
            vcpu: request.vcpu,
            memory_mb: request.memory_mb,
            disk_gb: request.disk_gb,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    async fn delete_sandbox(&self, sandbox_id: &str) -> Result<()> {
        self.docker
            .remove_container(
                sandbox_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("Failed to remove container {sandbox_id}"))?;
        Ok(())
    }

    fn attach(&mut self, sandbox_id: &str) {
        self.container_id = Some(sandbox_id.to_string());
    }

    fn attached(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    async fn exec(&self, command: &RemoteCommand) -> Result<ExecOutput> {
        let container = self.container()?;
        debug!("Docker exec in {}: {}", container, command);
        tokio::time::timeout(
            command.timeout_duration(),
            self.run_exec(container, command),
        )
        .await
        .map_err(|_| SandboxError::timeout(command.timeout_duration()))?
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let container = self.container()?;
        let tarball = tar_single_file(path, content.as_bytes())?;
        self.docker
            .upload_to_container(
                container,
                Some(UploadToContainerOptions {
                    path: "/".to_string(),
                    ..Default::default()
                }),
                tarball,
            )
            .await
            .with_context(|| format!("Failed to upload {path}"))?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let output = exec_checked(self, &RemoteCommand::new("cat").arg(path)).await?;
        Ok(output.stdout)
    }
}
