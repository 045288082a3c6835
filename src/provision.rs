//! Sandbox selection and creation.
//!
//! An agent owns at most one active sandbox. Selection adopts the newest
//! running sandbox in the fleet and only creates one when nothing is running.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use crate::config::AgentConfig;
use crate::sandbox::{SandboxClient, SandboxCreateRequest, SandboxInfo};

/// Name used when the agent has none configured.
pub(crate) const DEFAULT_SANDBOX_NAME: &str = "automaton";

/// Fixed minimal resource profile for new sandboxes.
const DEFAULT_VCPU: u32 = 1;
const DEFAULT_MEMORY_MB: u32 = 512;
const DEFAULT_DISK_GB: u32 = 5;

/// Creation request for an agent, using the minimal resource profile.
pub(crate) fn create_request(agent: &AgentConfig) -> SandboxCreateRequest {
    let name = agent.name.trim();
    SandboxCreateRequest {
        name: if name.is_empty() {
            DEFAULT_SANDBOX_NAME.to_string()
        } else {
            name.to_string()
        },
        vcpu: DEFAULT_VCPU,
        memory_mb: DEFAULT_MEMORY_MB,
        disk_gb: DEFAULT_DISK_GB,
    }
}

/// Pick the newest running sandbox.
///
/// A pair whose timestamps are missing or unparseable compares equal, so the
/// earlier entry in the list wins.
pub(crate) fn select_running(sandboxes: &[SandboxInfo]) -> Option<&SandboxInfo> {
    let mut running = sandboxes.iter().filter(|s| s.is_running());
    let mut chosen = running.next()?;

    for candidate in running {
        if let (Some(current), Some(next)) =
            (chosen.created_at_parsed(), candidate.created_at_parsed())
        {
            if next > current {
                chosen = candidate;
            }
        }
    }

    Some(chosen)
}

/// Adopt the newest running sandbox, or create one if none is running.
///
/// Listing and creation errors propagate unchanged; nothing is retried.
pub(crate) async fn ensure_sandbox<C>(client: &C, agent: &AgentConfig) -> Result<SandboxInfo>
where
    C: SandboxClient + ?Sized,
{
    let sandboxes = client.list_sandboxes().await?;

    if let Some(chosen) = select_running(&sandboxes) {
        info!("[sandbox] adopting existing running sandbox: {}", chosen.id);
        return Ok(chosen.clone());
    }

    let created = client.create_sandbox(&create_request(agent)).await?;
    info!("[sandbox] created new sandbox: {}", created.id);
    Ok(created)
}

/// Serializes provisioning decisions per agent name.
///
/// Two callers that both observe "nothing running" would otherwise each
/// create a sandbox. Holding the per-agent guard across list-then-create
/// makes the second caller see the first caller's sandbox.
#[derive(Debug, Default)]
pub(crate) struct Provisioner {
    guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Provisioner {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard_for(&self, agent_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guards.entry(agent_name.to_string()).or_default())
    }

    /// [`ensure_sandbox`] behind the agent's single-flight guard.
    pub async fn ensure<C>(&self, client: &C, agent: &AgentConfig) -> Result<SandboxInfo>
    where
        C: SandboxClient + ?Sized,
    {
        let guard = self.guard_for(&create_request(agent).name);
        let _held = guard.lock().await;
        ensure_sandbox(client, agent).await
    }
}
