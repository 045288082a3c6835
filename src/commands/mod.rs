//! CLI command implementations.
//!
//! Each submodule implements one CLI command; formatting is kept pure and
//! separate from the remote calls for testability.

pub mod ensure;
pub mod resolve;
pub mod state;
pub mod sync;

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::{Backend, Config};
use crate::provision::Provisioner;
use crate::sandbox::{ConwayClient, DockerClient, SandboxClient, SandboxInfo};

/// Settings shared by every command.
///
/// One `Session` lives for the whole process, so every provisioning decision
/// goes through the same per-agent guard.
pub(crate) struct Session {
    pub config: Config,
    pub api_key: Option<String>,
    provisioner: Provisioner,
}

impl Session {
    pub fn new(config: Config, api_key: Option<String>) -> Self {
        Self {
            config,
            api_key,
            provisioner: Provisioner::new(),
        }
    }

    /// Connect to the configured control plane without attaching.
    pub async fn connect(&self) -> Result<Box<dyn SandboxClient>> {
        let sandbox = &self.config.sandbox;
        match sandbox.backend {
            Backend::Conway => {
                let api_key = self
                    .api_key
                    .as_deref()
                    .filter(|key| !key.trim().is_empty())
                    .context("No Conway API key. Set CONWAY_API_KEY or pass --api-key")?;
                let client = ConwayClient::new(
                    &sandbox.api_url,
                    api_key,
                    Duration::from_secs(sandbox.timeout_secs),
                )?;
                Ok(Box::new(client))
            }
            Backend::Docker => {
                let client = DockerClient::connect(&sandbox.image)
                    .await
                    .context("Failed to connect to Docker. Is Docker running?")?;
                Ok(Box::new(client))
            }
        }
    }

    /// Adopt or create the agent's sandbox and attach a client to it.
    pub async fn attach_active(&self) -> Result<(Box<dyn SandboxClient>, SandboxInfo)> {
        let client = self.connect().await?;
        self.attach(client).await
    }

    async fn attach(
        &self,
        mut client: Box<dyn SandboxClient>,
    ) -> Result<(Box<dyn SandboxClient>, SandboxInfo)> {
        let info = self
            .provisioner
            .ensure(client.as_ref(), &self.config.agent)
            .await
            .context("Failed to obtain a running sandbox")?;
        client.attach(&info.id);
        Ok((client, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::mock::MockSandboxClient;

    #[tokio::test]
    async fn test_concurrent_attach_shares_one_sandbox() {
        let session = Session::new(Config::default(), None);
        let fleet = MockSandboxClient::new().with_list_delay(Duration::from_millis(20));

        let (a, b) = tokio::join!(
            session.attach(Box::new(fleet.clone())),
            session.attach(Box::new(fleet.clone()))
        );

        let (client_a, info_a) = a.unwrap();
        let (client_b, info_b) = b.unwrap();
        assert_eq!(fleet.created().len(), 1);
        assert_eq!(info_a.id, info_b.id);
        assert_eq!(client_a.attached(), Some(info_a.id.as_str()));
        assert_eq!(client_b.attached(), Some(info_b.id.as_str()));
    }
}
