//! Push local state into the agent's sandbox.

use anyhow::Result;
use std::path::PathBuf;

use super::Session;
use crate::sync::{format_report, sync_state_to_sandbox, SyncOptions};

pub async fn run(session: &Session, local_dir: Option<PathBuf>) -> Result<()> {
    let local_state_dir = match local_dir {
        Some(dir) => dir,
        None => session.config.local_state_dir()?,
    };

    let (client, _info) = session.attach_active().await?;
    let report = sync_state_to_sandbox(client.as_ref(), &SyncOptions { local_state_dir }).await?;

    print!("{}", format_report(&report));
    Ok(())
}
