//! Git operations on the sandbox state repository.
//!
//! Every operation is one or more structured remote commands. Non-zero exits
//! surface as `SandboxError::CommandFailed`; nothing here retries.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use crate::sandbox::{
    exec_checked, RemoteCommand, SandboxClient, LONG_TIMEOUT, SHORT_TIMEOUT,
};
use crate::sync::exclusion_manifest;

/// Committer identity used inside the sandbox.
const GIT_USER_NAME: &str = "Automaton";
const GIT_USER_EMAIL: &str = "automaton@conway.tech";

/// Message of the first commit in a fresh repository.
pub(crate) const GENESIS_MESSAGE: &str = "genesis: automaton state repository initialized";

/// Separates fields in `git log` output.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Outcome of [`init_repo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitOutcome {
    /// A new repository with a genesis commit was created.
    Created,
    /// `.git` was already present; nothing was touched.
    AlreadyInitialized,
}

/// Working-tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RepoStatus {
    /// Porcelain lines, one per changed path.
    pub changes: Vec<String>,
}

impl RepoStatus {
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }
}

/// One entry of the repository history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommitEntry {
    pub hash: String,
    pub author: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub message: String,
}

fn git(dir: &str) -> RemoteCommand {
    RemoteCommand::new("git").current_dir(dir)
}

/// Returns true if `dir/.git` exists.
pub(crate) async fn repo_exists<C>(client: &C, dir: &str) -> Result<bool>
where
    C: SandboxClient + ?Sized,
{
    let probe = RemoteCommand::new("test")
        .arg("-d")
        .arg(format!("{dir}/.git"))
        .timeout(SHORT_TIMEOUT);
    let output = client.exec(&probe).await?;
    Ok(output.success())
}

/// Initialize the state repository unless it already exists.
///
/// Never re-runs `git init` on an existing repository, so history survives
/// repeated calls.
pub(crate) async fn init_repo<C>(client: &C, dir: &str) -> Result<InitOutcome>
where
    C: SandboxClient + ?Sized,
{
    if repo_exists(client, dir).await? {
        debug!("State repository already initialized at {}", dir);
        return Ok(InitOutcome::AlreadyInitialized);
    }

    exec_checked(
        client,
        &RemoteCommand::new("git")
            .args(["init", dir])
            .timeout(LONG_TIMEOUT),
    )
    .await?;

    client
        .write_file(&format!("{dir}/.gitignore"), &exclusion_manifest())
        .await?;

    exec_checked(client, &git(dir).args(["config", "user.name", GIT_USER_NAME])).await?;
    exec_checked(client, &git(dir).args(["config", "user.email", GIT_USER_EMAIL])).await?;

    commit(client, dir, GENESIS_MESSAGE).await?;

    info!("Initialized state repository at {}", dir);
    Ok(InitOutcome::Created)
}

/// Working-tree status of the repository at `dir`.
pub(crate) async fn status<C>(client: &C, dir: &str) -> Result<RepoStatus>
where
    C: SandboxClient + ?Sized,
{
    let output = exec_checked(client, &git(dir).args(["status", "--porcelain"])).await?;
    Ok(parse_status(&output.stdout))
}

/// Stage everything under `dir` and commit it with `message`.
///
/// Returns a confirmation naming the new commit.
pub(crate) async fn commit<C>(client: &C, dir: &str, message: &str) -> Result<String>
where
    C: SandboxClient + ?Sized,
{
    exec_checked(client, &git(dir).args(["add", "-A"]).timeout(LONG_TIMEOUT)).await?;
    exec_checked(
        client,
        &git(dir)
            .args(["commit", "-m", message])
            .timeout(LONG_TIMEOUT),
    )
    .await?;

    let head = exec_checked(client, &git(dir).args(["rev-parse", "--short", "HEAD"])).await?;
    let hash = head.stdout.trim();

    debug!("Committed {} in {}", hash, dir);
    Ok(format!("Committed {hash}: {message}"))
}

/// The most recent `limit` commits, newest first.
pub(crate) async fn log<C>(client: &C, dir: &str, limit: usize) -> Result<Vec<CommitEntry>>
where
    C: SandboxClient + ?Sized,
{
    let output = exec_checked(
        client,
        &git(dir).args([
            "log".to_string(),
            "-n".to_string(),
            limit.to_string(),
            "--format=%H%x1f%an%x1f%aI%x1f%s".to_string(),
        ]),
    )
    .await?;
    Ok(parse_log(&output.stdout))
}

fn parse_status(stdout: &str) -> RepoStatus {
    RepoStatus {
        changes: stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn parse_log(stdout: &str) -> Vec<CommitEntry> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(4, FIELD_SEPARATOR);
            let hash = fields.next()?.trim().to_string();
            let author = fields.next()?.to_string();
            let date = DateTime::parse_from_rfc3339(fields.next()?.trim()).ok();
            let message = fields.next().unwrap_or_default().to_string();
            Some(CommitEntry {
                hash,
                author,
                date,
                message,
            })
        })
        .collect()
}
