//! Version control of the agent's state directory.
//!
//! - `git`: the remote git driver (init, status, commit, log)
//! - `recorder`: categorized state-change commits built on the driver

pub(crate) mod git;
mod recorder;

pub(crate) use git::{CommitEntry, InitOutcome};
pub(crate) use recorder::{Category, SkillAction, StateRecorder, DEFAULT_HISTORY_LIMIT};
