//! Changed files from git.
//!
//! Combines the diff against a base revision with the current working tree
//! status. Working tree entries take precedence, so a file committed as
//! modified and then deleted locally counts as deleted.

use crate::changes::{ChangeStatus, ChangedPaths};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Where the base revision for the diff comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseRevision {
    /// No historical diff; only working tree changes count.
    None,
    /// A user-supplied ref, resolved with `git rev-parse`.
    Explicit(String),
    /// The merge base with `origin/<main branch>` in CI, `HEAD` otherwise.
    Detect { main_branch: String },
}

/// Collects changed paths for the repository at `root`.
pub fn changed_paths(root: &Path, base: &BaseRevision) -> Result<ChangedPaths> {
    let mut changes = ChangedPaths::new();

    if let Some(revision) = resolve_base(root, base)? {
        let diff = run_git(root, &["diff", "--name-status", "-z", &revision], "get diff")?;
        changes = parse_name_status(&diff);
        log::debug!("{} paths changed since {}", changes.len(), revision);
    }

    let status = run_git(root, &["status", "--porcelain", "-z"], "get working tree status")?;
    let worktree = parse_porcelain(&status);
    log::debug!("{} paths changed in the working tree", worktree.len());
    changes.merge(worktree);

    Ok(changes)
}

fn resolve_base(root: &Path, base: &BaseRevision) -> Result<Option<String>> {
    match base {
        BaseRevision::None => Ok(None),
        BaseRevision::Explicit(r) => {
            let out = run_git(root, &["rev-parse", r], "resolve base revision")?;
            Ok(Some(out.trim().to_string()))
        }
        BaseRevision::Detect { main_branch } => {
            if std::env::var_os("CI").is_some_and(|v| !v.is_empty()) {
                log::debug!("Pipeline mode: comparing with {} via merge-base", main_branch);
                main_branch_base(root, main_branch).map(Some)
            } else {
                log::debug!("Local mode: comparing with HEAD");
                let out = run_git(root, &["rev-parse", "HEAD"], "get current revision")?;
                Ok(Some(out.trim().to_string()))
            }
        }
    }
}

/// Fetches `main_branch` and returns its merge base with `HEAD`.
fn main_branch_base(root: &Path, main_branch: &str) -> Result<String> {
    run_git(root, &["fetch", "origin", main_branch], "fetch main branch")?;
    let remote = format!("origin/{}", main_branch);
    let out = run_git(root, &["merge-base", &remote, "HEAD"], "find merge base")?;
    Ok(out.trim().to_string())
}

fn run_git(root: &Path, args: &[&str], purpose: &str) -> Result<String> {
    log::debug!("Running git {} to {}", args.join(" "), purpose);
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .context("Failed to run git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `git diff --name-status -z` output.
///
/// Every field is NUL-terminated and paths are written verbatim. Renames and
/// copies carry a similarity score (`R100`) followed by two paths; a rename
/// records the old path as deleted and the new one as renamed, a copy records
/// only the new path.
pub fn parse_name_status(output: &str) -> ChangedPaths {
    let mut changes = ChangedPaths::new();
    let mut fields = output.split('\0');
    while let Some(code) = fields.next() {
        let Some(status) = code.trim().chars().next().map(ChangeStatus::from_code) else {
            continue;
        };
        let Some(path) = fields.next().filter(|p| !p.is_empty()) else {
            break;
        };
        match status {
            ChangeStatus::Renamed | ChangeStatus::Copied => {
                let Some(new_path) = fields.next().filter(|p| !p.is_empty()) else {
                    break;
                };
                if status == ChangeStatus::Renamed {
                    changes.insert(path, ChangeStatus::Deleted);
                }
                changes.insert(new_path, status);
            }
            _ => changes.insert(path, status),
        }
    }
    changes
}

/// Parses `git status --porcelain -z` (v1) output.
///
/// Entries are `XY <path>` terminated by NUL. A rename or copy entry names
/// the new path and is followed by one more field holding the original path.
/// The status is the first non-blank of the two columns, so staged and
/// unstaged changes are treated alike.
pub fn parse_porcelain(output: &str) -> ChangedPaths {
    let mut changes = ChangedPaths::new();
    let mut fields = output.split('\0');
    while let Some(entry) = fields.next() {
        if entry.len() < 4 || entry.as_bytes()[2] != b' ' {
            continue;
        }
        let (columns, path) = entry.split_at(3);
        let has_origin = columns.contains(['R', 'C']);
        let origin = if has_origin { fields.next() } else { None };
        let Some(code) = columns.chars().find(|c| *c != ' ') else {
            continue;
        };
        let status = ChangeStatus::from_code(code);
        match (status, origin) {
            (ChangeStatus::Renamed, Some(old)) => {
                changes.insert(old, ChangeStatus::Deleted);
                changes.insert(path, ChangeStatus::Renamed);
            }
            _ => changes.insert(path, status),
        }
    }
    changes
}
