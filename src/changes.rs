//! Changed paths and their status.
//!
//! A [`ChangedPaths`] holds at most one status per path. Inserting a path that
//! is already present overwrites its status, so sources merged later win.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Status of a changed path, as reported by `git diff --name-status` or
/// `git status --porcelain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "char")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Unmerged,
    Untracked,
    Other(char),
}

impl ChangeStatus {
    pub fn from_code(code: char) -> Self {
        match code {
            'A' => Self::Added,
            'M' => Self::Modified,
            'D' => Self::Deleted,
            'R' => Self::Renamed,
            'C' => Self::Copied,
            'T' => Self::TypeChanged,
            'U' => Self::Unmerged,
            '?' => Self::Untracked,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::TypeChanged => 'T',
            Self::Unmerged => 'U',
            Self::Untracked => '?',
            Self::Other(c) => c,
        }
    }

    pub fn is_deletion(self) -> bool {
        self == Self::Deleted
    }
}

impl From<ChangeStatus> for char {
    fn from(status: ChangeStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A single changed file, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedPath {
    pub path: String,
    pub status: ChangeStatus,
}

impl ChangedPath {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// Set of changed paths keyed by path. Iteration order is lexicographic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedPaths {
    entries: BTreeMap<String, ChangeStatus>,
}

/// [`ChangedPaths`] split by deletion status.
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    pub all: Vec<&'a str>,
    pub existing: Vec<&'a str>,
    pub deleted: Vec<&'a str>,
}

impl ChangedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` with `status`, replacing any earlier status.
    pub fn insert(&mut self, path: impl Into<String>, status: ChangeStatus) {
        self.entries.insert(path.into(), status);
    }

    /// Merges `later` into `self`; entries from `later` win on conflict.
    pub fn merge(&mut self, later: ChangedPaths) {
        self.entries.extend(later.entries);
    }

    pub fn status(&self, path: &str) -> Option<ChangeStatus> {
        self.entries.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChangeStatus)> {
        self.entries.iter().map(|(p, s)| (p.as_str(), *s))
    }

    /// Splits into all paths, non-deleted paths and deleted paths.
    pub fn partition(&self) -> Partition<'_> {
        let mut partition = Partition::default();
        for (path, status) in self.iter() {
            partition.all.push(path);
            if status.is_deletion() {
                partition.deleted.push(path);
            } else {
                partition.existing.push(path);
            }
        }
        partition
    }

    pub fn to_vec(&self) -> Vec<ChangedPath> {
        self.iter().map(|(p, s)| ChangedPath::new(p, s)).collect()
    }
}

impl FromIterator<ChangedPath> for ChangedPaths {
    fn from_iter<I: IntoIterator<Item = ChangedPath>>(iter: I) -> Self {
        let mut paths = Self::new();
        for change in iter {
            paths.insert(change.path, change.status);
        }
        paths
    }
}

impl<'a> FromIterator<(&'a str, char)> for ChangedPaths {
    fn from_iter<I: IntoIterator<Item = (&'a str, char)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(path, code)| ChangedPath::new(path, ChangeStatus::from_code(code)))
            .collect()
    }
}

/// Parses a `STATUS:path` pair as passed on the command line.
pub fn parse_change(s: &str) -> Result<ChangedPath, String> {
    let Some((status, path)) = s.split_once(':') else {
        return Err(format!("Invalid change format '{}', expected 'STATUS:path'", s));
    };
    let mut chars = status.chars();
    let (Some(code), None) = (chars.next(), chars.next()) else {
        return Err(format!("Invalid status '{}', expected a single character", status));
    };
    if path.is_empty() {
        return Err(format!("Missing path in '{}'", s));
    }
    Ok(ChangedPath::new(path, ChangeStatus::from_code(code)))
}
