//! Categorized commits of agent state changes.
//!
//! Higher-level agent logic calls into the recorder after every
//! self-modification; each dirty call produces exactly one commit whose
//! message starts with its category.

use anyhow::Result;
use clap::ValueEnum;
use std::fmt;

use super::git::{self, CommitEntry, InitOutcome};
use crate::paths::StateLayout;
use crate::sandbox::SandboxClient;

/// Returned instead of a commit confirmation when the tree is clean.
pub(crate) const NO_CHANGES: &str = "No changes to commit";

/// Number of history entries returned by default.
pub(crate) const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Well-known commit categories.
///
/// Any non-empty string is a valid category; these are the ones the
/// recorder's helpers use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Category {
    #[default]
    State,
    Soul,
    Skill,
    Heartbeat,
    Config,
}

impl Category {
    const ALL: [Self; 5] = [
        Self::State,
        Self::Soul,
        Self::Skill,
        Self::Heartbeat,
        Self::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Soul => "soul",
            Self::Skill => "skill",
            Self::Heartbeat => "heartbeat",
            Self::Config => "config",
        }
    }

    /// The well-known category named `name`, if any.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skill lifecycle change folded into a skill commit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SkillAction {
    Install,
    Remove,
    Update,
}

impl fmt::Display for SkillAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Remove => write!(f, "remove"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Commit message for a state change.
pub(crate) fn commit_message(category: &str, description: &str) -> String {
    format!("{category}: {description}")
}

/// Records state changes as commits in the sandbox state repository.
pub(crate) struct StateRecorder<'a, C: SandboxClient + ?Sized> {
    client: &'a C,
    repo_dir: String,
}

impl<'a, C: SandboxClient + ?Sized> StateRecorder<'a, C> {
    /// A recorder for the repository described by `layout`.
    pub fn new(client: &'a C, layout: &StateLayout) -> Self {
        Self {
            client,
            repo_dir: layout.repo_dir.clone(),
        }
    }

    pub fn repo_dir(&self) -> &str {
        &self.repo_dir
    }

    /// Initialize the repository if needed.
    pub async fn init(&self) -> Result<InitOutcome> {
        git::init_repo(self.client, &self.repo_dir).await
    }

    /// Commit pending changes as `<category>: <description>`.
    ///
    /// Returns [`NO_CHANGES`] without committing when the tree is clean.
    pub async fn commit_state_change(&self, description: &str, category: &str) -> Result<String> {
        let status = git::status(self.client, &self.repo_dir).await?;
        if status.is_clean() {
            return Ok(NO_CHANGES.to_string());
        }

        git::commit(
            self.client,
            &self.repo_dir,
            &commit_message(category, description),
        )
        .await
    }

    /// Commit after a `SOUL.md` update.
    pub async fn commit_soul_update(&self, description: &str) -> Result<String> {
        self.commit_state_change(description, Category::Soul.as_str())
            .await
    }

    /// Commit after a skill is installed, removed or updated.
    pub async fn commit_skill_change(&self, skill_name: &str, action: SkillAction) -> Result<String> {
        self.commit_state_change(&format!("{action} skill: {skill_name}"), Category::Skill.as_str())
            .await
    }

    /// Commit after a heartbeat configuration change.
    pub async fn commit_heartbeat_change(&self, description: &str) -> Result<String> {
        self.commit_state_change(description, Category::Heartbeat.as_str())
            .await
    }

    /// Commit after a configuration change.
    pub async fn commit_config_change(&self, description: &str) -> Result<String> {
        self.commit_state_change(description, Category::Config.as_str())
            .await
    }

    /// The most recent `limit` commits, newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<CommitEntry>> {
        git::log(self.client, &self.repo_dir, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::mock::MockSandboxClient;
    use crate::sandbox::{ExecOutput, RemoteCommand};

    fn is_git(cmd: &RemoteCommand, sub: &str) -> bool {
        cmd.program() == "git" && cmd.arguments().first().map(String::as_str) == Some(sub)
    }

    /// A sandbox whose working tree reports `porcelain` as its status.
    fn repo_with_status(porcelain: &'static str) -> MockSandboxClient {
        MockSandboxClient::new().with_exec_handler(move |cmd| {
            if is_git(cmd, "status") {
                ExecOutput::ok(porcelain)
            } else if is_git(cmd, "rev-parse") {
                ExecOutput::ok("f00d123\n")
            } else {
                ExecOutput::ok("")
            }
        })
    }

    fn commit_calls(client: &MockSandboxClient) -> Vec<RemoteCommand> {
        client
            .execs()
            .into_iter()
            .filter(|cmd| is_git(cmd, "commit"))
            .collect()
    }

    fn layout() -> StateLayout {
        StateLayout {
            repo_dir: "/root/.automaton".to_string(),
        }
    }

    #[tokio::test]
    async fn test_clean_tree_returns_sentinel_without_commit() {
        let client = repo_with_status("");
        let recorder = StateRecorder::new(&client, &layout());

        let result = recorder
            .commit_state_change("nothing happened", Category::State.as_str())
            .await
            .unwrap();

        assert_eq!(result, NO_CHANGES);
        assert!(commit_calls(&client).is_empty());
        assert_eq!(client.execs().len(), 1);
    }

    #[tokio::test]
    async fn test_dirty_tree_commits_once_with_category_prefix() {
        let client = repo_with_status(" M SOUL.md\n");
        let recorder = StateRecorder::new(&client, &layout());

        let result = recorder
            .commit_state_change("rewrote values", Category::default().as_str())
            .await
            .unwrap();

        assert_eq!(result, "Committed f00d123: state: rewrote values");
        let commits = commit_calls(&client);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].arguments()[2], "state: rewrote values");
        assert_eq!(commits[0].working_dir(), Some("/root/.automaton"));
    }

    #[tokio::test]
    async fn test_skill_change_message() {
        let client = repo_with_status("?? skills/research/SKILL.md\n");
        let recorder = StateRecorder::new(&client, &layout());

        recorder
            .commit_skill_change("research", SkillAction::Install)
            .await
            .unwrap();

        assert_eq!(
            commit_calls(&client)[0].arguments()[2],
            "skill: install skill: research"
        );
    }

    #[tokio::test]
    async fn test_convenience_wrappers_use_their_category() {
        let cases: [(&str, Category); 3] = [
            ("soul: ", Category::Soul),
            ("heartbeat: ", Category::Heartbeat),
            ("config: ", Category::Config),
        ];

        for (prefix, category) in cases {
            let client = repo_with_status(" M file\n");
            let recorder = StateRecorder::new(&client, &layout());
            match category {
                Category::Soul => recorder.commit_soul_update("x").await.unwrap(),
                Category::Heartbeat => recorder.commit_heartbeat_change("x").await.unwrap(),
                _ => recorder.commit_config_change("x").await.unwrap(),
            };
            let message = commit_calls(&client)[0].arguments()[2].clone();
            assert_eq!(message, format!("{prefix}x"));
        }
    }

    #[tokio::test]
    async fn test_history_uses_layout_repo_dir() {
        let client = MockSandboxClient::new();
        let layout = StateLayout::resolve(None, Some("/home/tester"));
        let recorder = StateRecorder::new(&client, &layout);

        let entries = recorder.history(DEFAULT_HISTORY_LIMIT).await.unwrap();

        assert!(entries.is_empty());
        let call = &client.execs()[0];
        assert_eq!(call.working_dir(), Some("/home/tester/.automaton"));
        assert_eq!(call.arguments()[..3], ["log", "-n", "20"]);
    }

    #[tokio::test]
    async fn test_init_probes_layout_repo_dir() {
        let client = MockSandboxClient::new().with_exec_handler(|_| ExecOutput::ok(""));
        let recorder = StateRecorder::new(&client, &layout());

        let outcome = recorder.init().await.unwrap();

        assert_eq!(outcome, InitOutcome::AlreadyInitialized);
        assert_eq!(client.exec_lines(), vec!["test -d /root/.automaton/.git"]);
    }

    #[tokio::test]
    async fn test_status_failure_propagates() {
        let client = MockSandboxClient::new()
            .with_exec_handler(|_| ExecOutput::failed(128, "fatal: not a git repository"));
        let recorder = StateRecorder::new(&client, &layout());

        let result = recorder.commit_soul_update("x").await;

        assert!(result.is_err());
        assert!(commit_calls(&client).is_empty());
    }

    #[tokio::test]
    async fn test_free_form_category() {
        let client = repo_with_status(" M memory/facts.md\n");
        let recorder = StateRecorder::new(&client, &layout());

        let result = recorder
            .commit_state_change("learned the user's timezone", "memory")
            .await
            .unwrap();

        assert_eq!(result, "Committed f00d123: memory: learned the user's timezone");
        assert_eq!(
            commit_calls(&client)[0].arguments()[2],
            "memory: learned the user's timezone"
        );
    }

    #[test]
    fn test_category_from_name() {
        assert_eq!(Category::from_name("soul"), Some(Category::Soul));
        assert_eq!(Category::from_name("config"), Some(Category::Config));
        assert_eq!(Category::from_name("memory"), None);
        assert_eq!(Category::from_name("Soul"), None);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::default().to_string(), "state");
        assert_eq!(commit_message(Category::Heartbeat.as_str(), "every 5m"), "heartbeat: every 5m");
        assert_eq!(SkillAction::Remove.to_string(), "remove");
    }
}
