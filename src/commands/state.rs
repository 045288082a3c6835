//! State repository commands: init, commit, skill and history.

use anyhow::{bail, Result};
use colored::Colorize;
use std::fmt::Write;
use tracing::{debug, info};

use super::Session;
use crate::paths::StateLayout;
use crate::sandbox::{RemoteCommand, SandboxClient, SHORT_TIMEOUT};
use crate::versioning::{Category, CommitEntry, InitOutcome, SkillAction, StateRecorder};

/// `$HOME` inside the attached sandbox, if it can be read.
async fn sandbox_home(client: &dyn SandboxClient) -> Option<String> {
    let command = RemoteCommand::new("printenv")
        .arg("HOME")
        .timeout(SHORT_TIMEOUT);
    match client.exec(&command).await {
        Ok(output) if output.success() => {
            let home = output.stdout.trim();
            (!home.is_empty()).then(|| home.to_string())
        }
        Ok(_) => None,
        Err(e) => {
            debug!("Could not read sandbox HOME: {}", e);
            None
        }
    }
}

/// Resolve the state repository once for this process.
async fn layout(session: &Session, client: &dyn SandboxClient) -> StateLayout {
    let repo_override = session.config.state.repo_dir.as_deref();
    if repo_override.is_some() {
        return StateLayout::resolve(repo_override, None);
    }
    StateLayout::resolve(None, sandbox_home(client).await.as_deref())
}

pub async fn run_init(session: &Session) -> Result<()> {
    let (client, _info) = session.attach_active().await?;
    let layout = layout(session, client.as_ref()).await;
    let recorder = StateRecorder::new(client.as_ref(), &layout);

    match recorder.init().await? {
        InitOutcome::Created => println!(
            "\n{} Initialized state repository at {}",
            "✓".green(),
            recorder.repo_dir().cyan()
        ),
        InitOutcome::AlreadyInitialized => println!(
            "\n{} State repository already initialized at {}",
            "ℹ".blue(),
            recorder.repo_dir().cyan()
        ),
    }
    Ok(())
}

pub async fn run_commit(session: &Session, description: &str, category: &str) -> Result<()> {
    if description.trim().is_empty() {
        bail!("Description cannot be empty");
    }
    let category = category.trim();
    if category.is_empty() {
        bail!("Category cannot be empty");
    }

    let (client, _info) = session.attach_active().await?;
    let layout = layout(session, client.as_ref()).await;
    let recorder = StateRecorder::new(client.as_ref(), &layout);

    let result = match Category::from_name(category) {
        Some(Category::Soul) => recorder.commit_soul_update(description).await?,
        Some(Category::Heartbeat) => recorder.commit_heartbeat_change(description).await?,
        Some(Category::Config) => recorder.commit_config_change(description).await?,
        _ => recorder.commit_state_change(description, category).await?,
    };
    info!("{}", result);
    println!("\n{} {}", "✓".green(), result);
    Ok(())
}

pub async fn run_skill(session: &Session, name: &str, action: SkillAction) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Skill name cannot be empty");
    }

    let (client, _info) = session.attach_active().await?;
    let layout = layout(session, client.as_ref()).await;
    let recorder = StateRecorder::new(client.as_ref(), &layout);

    let result = recorder.commit_skill_change(name, action).await?;
    println!("\n{} {}", "✓".green(), result);
    Ok(())
}

pub async fn run_history(session: &Session, limit: usize) -> Result<()> {
    let (client, _info) = session.attach_active().await?;
    let layout = layout(session, client.as_ref()).await;
    let recorder = StateRecorder::new(client.as_ref(), &layout);

    let entries = recorder.history(limit).await?;
    print!("{}", format_history(&entries));
    Ok(())
}

/// Format history entries, newest first.
pub fn format_history(entries: &[CommitEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        let _ = writeln!(out, "\n{} No state history yet.", "ℹ".blue());
        return out;
    }

    let _ = writeln!(out, "\nState history:");
    for entry in entries {
        let short = entry.hash.get(..7).unwrap_or(&entry.hash);
        let date = entry
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {} {} {} {}",
            short.yellow(),
            date.dimmed(),
            entry.message,
            format!("({})", entry.author).dimmed()
        );
    }
    out
}
