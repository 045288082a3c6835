//! Push local agent state into the sandbox.
//!
//! Only allow-listed top-level files and per-skill `SKILL.md` documents leave
//! the local machine. Credentials, wallets and databases never do, and the
//! exclusion manifest written alongside them keeps them out of history.

use anyhow::Result;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::paths::{sandbox_state_path, SANDBOX_AUTOMATON_DIR};
use crate::sandbox::{exec_checked, RemoteCommand, SandboxClient, LONG_TIMEOUT};

/// Top-level state files allowed to sync.
pub(crate) const ALLOWED_SYNC_FILES: &[&str] = &["constitution.md", "SOUL.md", "WORKLOG.md"];

/// Files that must never leave the local machine.
pub(crate) const SENSITIVE_FILES: &[&str] = &[
    "wallet.json",
    "automaton.json",
    "config.json",
    "state.db",
    "state.db-wal",
    "state.db-shm",
];

/// Patterns excluded from history on top of [`SENSITIVE_FILES`].
const EXTRA_IGNORE_PATTERNS: &[&str] = &["logs/", "*.log", "*.err"];

/// Marker file identifying a skill directory.
pub(crate) const SKILL_MARKER: &str = "SKILL.md";

const SKILLS_DIR: &str = "skills";
const MANIFEST_FILE: &str = ".gitignore";

/// Returns true if `name` may never be synced or committed.
pub(crate) fn is_sensitive(name: &str) -> bool {
    SENSITIVE_FILES.contains(&name)
}

/// Allow-listed names minus anything sensitive.
pub(crate) fn syncable_files() -> impl Iterator<Item = &'static str> {
    allowed_minus_denied(ALLOWED_SYNC_FILES, SENSITIVE_FILES)
}

/// Names in `allowed` that are not in `denied`; the deny list always wins.
fn allowed_minus_denied<'a>(
    allowed: &'a [&'a str],
    denied: &'a [&'a str],
) -> impl Iterator<Item = &'a str> {
    allowed
        .iter()
        .copied()
        .filter(move |name| !denied.contains(name))
}

/// Contents of the exclusion manifest.
pub(crate) fn exclusion_manifest() -> String {
    let mut out = String::from("# Sensitive files - never commit\n");
    for name in SENSITIVE_FILES.iter().chain(EXTRA_IGNORE_PATTERNS) {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{name}");
    }
    out
}

/// Options for [`sync_state_to_sandbox`].
#[derive(Debug, Clone)]
pub(crate) struct SyncOptions {
    /// Local state directory, usually `~/.automaton`.
    pub local_state_dir: PathBuf,
}

/// What a sync pushed and what it left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SyncReport {
    /// Top-level files written to the sandbox.
    pub synced: Vec<String>,
    /// Files or skills that were present but could not be read.
    pub skipped: Vec<String>,
    /// Skills whose `SKILL.md` was written.
    pub skills: Vec<String>,
}

/// Push allow-listed state files and skill documents into the sandbox.
///
/// Local problems (missing or unreadable files) are skipped per file; remote
/// failures abort the sync. Each write is independent, so re-running after a
/// failure converges.
pub(crate) async fn sync_state_to_sandbox<C>(client: &C, options: &SyncOptions) -> Result<SyncReport>
where
    C: SandboxClient + ?Sized,
{
    let local_dir = options.local_state_dir.as_path();
    let mut report = SyncReport::default();

    mkdir_remote(client, &sandbox_state_path(SKILLS_DIR)).await?;

    for name in syncable_files() {
        let local_path = local_dir.join(name);
        if !local_path.is_file() {
            debug!("Not syncing {}: not present locally", name);
            continue;
        }

        match read_lossy(&local_path) {
            Ok(content) => {
                client.write_file(&sandbox_state_path(name), &content).await?;
                report.synced.push(name.to_string());
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                report.skipped.push(name.to_string());
            }
        }
    }

    client
        .write_file(&sandbox_state_path(MANIFEST_FILE), &exclusion_manifest())
        .await?;

    let local_skills = local_dir.join(SKILLS_DIR);
    if !local_skills.is_dir() {
        info!(
            "Synced {} state file(s) to {}",
            report.synced.len(),
            SANDBOX_AUTOMATON_DIR
        );
        return Ok(report);
    }

    for skill in skill_candidates(&local_skills) {
        let marker = local_skills.join(&skill).join(SKILL_MARKER);
        let content = match read_lossy(&marker) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping skill {}: {}", skill, e);
                report.skipped.push(format!("{SKILLS_DIR}/{skill}"));
                continue;
            }
        };

        let remote_dir = sandbox_state_path(&format!("{SKILLS_DIR}/{skill}"));
        mkdir_remote(client, &remote_dir).await?;
        client
            .write_file(&format!("{remote_dir}/{SKILL_MARKER}"), &content)
            .await?;
        report.skills.push(skill);
    }

    info!(
        "Synced {} state file(s) and {} skill(s) to {}",
        report.synced.len(),
        report.skills.len(),
        SANDBOX_AUTOMATON_DIR
    );
    Ok(report)
}

/// Reads a file as text, replacing invalid UTF-8 sequences.
fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Skill directory names under `skills_dir` that carry a marker file, sorted.
fn skill_candidates(skills_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(skills_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read skills directory {}: {}", skills_dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.is_empty() && !is_sensitive(name))
        .filter(|name| {
            let dir = skills_dir.join(name);
            dir.is_dir() && dir.join(SKILL_MARKER).is_file()
        })
        .collect();

    names.sort();
    names
}

async fn mkdir_remote<C>(client: &C, dir: &str) -> Result<()>
where
    C: SandboxClient + ?Sized,
{
    let command = RemoteCommand::new("mkdir")
        .args(["-p", dir])
        .timeout(LONG_TIMEOUT);
    exec_checked(client, &command).await?;
    Ok(())
}

/// Format a sync report for display.
pub(crate) fn format_report(report: &SyncReport) -> String {
    use colored::Colorize;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{} Synced state to {}",
        "✓".green(),
        SANDBOX_AUTOMATON_DIR.cyan()
    );
    for name in &report.synced {
        let _ = writeln!(out, "  {} {}", "→".green(), name);
    }
    for skill in &report.skills {
        let _ = writeln!(out, "  {} {}/{}/{}", "→".green(), SKILLS_DIR, skill, SKILL_MARKER);
    }
    for name in &report.skipped {
        let _ = writeln!(out, "  {} {} {}", "⚠".yellow(), name, "(unreadable)".dimmed());
    }
    out
}
