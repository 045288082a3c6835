//! Sandbox path resolution.
//!
//! Single source of truth for the sandbox home directory and for turning
//! agent-supplied paths (`~/notes.md`, `skills/x`, `/var/log/app.log`) into
//! canonical absolute paths inside the sandbox filesystem.

/// Home directory inside the sandbox VM.
pub(crate) const SANDBOX_HOME: &str = "/root";

/// State directory inside the sandbox.
pub(crate) const SANDBOX_AUTOMATON_DIR: &str = "/root/.automaton";

/// Name of the state directory relative to a home directory.
const STATE_DIR_NAME: &str = ".automaton";

/// Resolve a path to an absolute, normalized path in the sandbox.
///
/// - `~` or `~/...` resolves under [`SANDBOX_HOME`]
/// - relative paths resolve under [`SANDBOX_HOME`]
/// - absolute paths are only normalized
pub(crate) fn resolve_sandbox_path(path: &str) -> String {
    let trimmed = path.trim();

    if let Some(rest) = trimmed.strip_prefix('~') {
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        return normalize(&join(SANDBOX_HOME, rest));
    }

    if trimmed.starts_with('/') {
        normalize(trimmed)
    } else {
        normalize(&join(SANDBOX_HOME, trimmed))
    }
}

/// Path of a file relative to the sandbox state directory.
pub(crate) fn sandbox_state_path(relative: &str) -> String {
    normalize(&join(SANDBOX_AUTOMATON_DIR, relative))
}

fn join(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// Lexically normalize a POSIX path.
///
/// Collapses repeated separators, drops `.` segments and resolves `..`
/// against the preceding segment. A trailing separator is kept. Relative
/// paths keep leading `..` segments they cannot resolve.
pub(crate) fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    let mut normalized = match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    };
    if path.ends_with('/') && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Where the version-controlled state repository lives.
///
/// Resolved once at startup and passed explicitly to every recorder call,
/// so nothing downstream reads the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StateLayout {
    /// Absolute path of the state repository.
    pub repo_dir: String,
}

impl StateLayout {
    /// Resolve the layout from an explicit override or a home directory.
    ///
    /// Falls back to [`SANDBOX_AUTOMATON_DIR`] when neither is available.
    pub fn resolve(repo_override: Option<&str>, home: Option<&str>) -> Self {
        let repo_dir = match (repo_override, home) {
            (Some(dir), _) if !dir.trim().is_empty() => resolve_sandbox_path(dir),
            (_, Some(home)) if !home.trim().is_empty() => {
                normalize(&join(home.trim(), STATE_DIR_NAME))
            }
            _ => SANDBOX_AUTOMATON_DIR.to_string(),
        };
        Self { repo_dir }
    }
}

impl Default for StateLayout {
    fn default() -> Self {
        Self {
            repo_dir: SANDBOX_AUTOMATON_DIR.to_string(),
        }
    }
}
