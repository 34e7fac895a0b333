//! Path matchers for the four change categories.
//!
//! Paths are `/`-separated and relative to the repository root. Each matcher
//! works on path segments and returns the captured identifiers as typed
//! values; a path that fits no category yields `None`.

use crate::config::Conventions;
use serde::Serialize;
use std::fmt;

/// Which shared resource a global change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlobalKind {
    /// Anything under the library directory.
    Library,
    /// The global template step directory, e.g. `envs/_env/ytt/`.
    GlobalTemplates,
    /// The data file at the root of the environments directory.
    BaseData,
}

impl fmt::Display for GlobalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::GlobalTemplates => write!(f, "global templates"),
            Self::BaseData => write!(f, "base environment data"),
        }
    }
}

/// Category of a changed path plus the identifiers it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum PathMatch {
    Global { kind: GlobalKind },
    EnvironmentData { environment: String },
    Application { environment: String, application: String },
    Prototype { name: String },
}

impl fmt::Display for PathMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global { kind } => write!(f, "global ({})", kind),
            Self::EnvironmentData { environment } => write!(f, "environment {}", environment),
            Self::Application {
                environment,
                application,
            } => write!(f, "application {} in {}", application, environment),
            Self::Prototype { name } => write!(f, "prototype {}", name),
        }
    }
}

/// Matchers built from a set of [`Conventions`].
#[derive(Debug, Clone)]
pub struct PathPatterns {
    library_dir: String,
    environments_dir: String,
    environment_data_file: String,
    environment_global_dir: String,
    global_step_dir: String,
    applications_dir: String,
    prototypes_dir: String,
    application_data_file: String,
    step_dirs: Vec<String>,
}

impl PathPatterns {
    pub fn new(conventions: &Conventions) -> Self {
        Self {
            library_dir: conventions.library_dir.clone(),
            environments_dir: conventions.environments_dir.clone(),
            environment_data_file: conventions.environment_data_file.clone(),
            environment_global_dir: conventions.environment_global_dir.clone(),
            global_step_dir: conventions.ytt_step_dir.clone(),
            applications_dir: conventions.applications_dir.clone(),
            prototypes_dir: conventions.prototypes_dir.clone(),
            application_data_file: conventions.application_data_file.clone(),
            step_dirs: conventions
                .step_dirs()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Returns the first category `path` falls into, checking global,
    /// environment-data, application and prototype matchers in that order.
    pub fn classify(&self, path: &str) -> Option<PathMatch> {
        if let Some(kind) = self.match_global(path) {
            return Some(PathMatch::Global { kind });
        }
        if let Some(environment) = self.match_environment_data(path) {
            return Some(PathMatch::EnvironmentData { environment });
        }
        if let Some((environment, application)) = self.match_application(path) {
            return Some(PathMatch::Application {
                environment,
                application,
            });
        }
        self.match_prototype(path)
            .map(|name| PathMatch::Prototype { name })
    }

    pub fn match_global(&self, path: &str) -> Option<GlobalKind> {
        if strip_root(path, &self.library_dir).is_some() {
            return Some(GlobalKind::Library);
        }

        let rest = strip_root(path, &self.environments_dir)?;
        if rest == self.environment_data_file {
            return Some(GlobalKind::BaseData);
        }
        let mut segments = rest.split('/');
        if segments.next() == Some(self.environment_global_dir.as_str())
            && segments.next() == Some(self.global_step_dir.as_str())
            && segments.next().is_some()
        {
            return Some(GlobalKind::GlobalTemplates);
        }
        None
    }

    /// Matches `<envs>/<env path>/<environment data file>` and returns the
    /// environment path. The file directly under `<envs>` is global, not an
    /// environment.
    pub fn match_environment_data(&self, path: &str) -> Option<String> {
        let rest = strip_root(path, &self.environments_dir)?;
        let (dir, file) = rest.rsplit_once('/')?;
        if file != self.environment_data_file || dir.is_empty() {
            return None;
        }
        Some(path[..path.len() - file.len() - 1].to_string())
    }

    /// Matches `<envs>/<env path>/<apps dir>/<application>/...` and returns the
    /// environment path and the application name. The first applications
    /// directory that is followed by a name and at least one more segment wins.
    pub fn match_application(&self, path: &str) -> Option<(String, String)> {
        let rest = strip_root(path, &self.environments_dir)?;
        let segments: Vec<&str> = rest.split('/').collect();

        for i in 1..segments.len() {
            // The application directory needs a name and something inside it.
            if segments[i] != self.applications_dir || i + 2 >= segments.len() {
                continue;
            }
            let application = segments[i + 1];
            if application.is_empty() {
                continue;
            }
            let environment = format!("{}/{}", self.environments_dir, segments[..i].join("/"));
            return Some((environment, application.to_string()));
        }
        None
    }

    /// Matches either a prototype data file or any path inside one of the
    /// prototype step directories, returning the prototype name.
    pub fn match_prototype(&self, path: &str) -> Option<String> {
        self.match_prototype_data(path)
            .or_else(|| self.match_prototype_step(path))
    }

    /// `<prototypes>/[group/...]<name>/<application data file>`
    pub fn match_prototype_data(&self, path: &str) -> Option<String> {
        let rest = strip_root(path, &self.prototypes_dir)?;
        let segments: Vec<&str> = rest.split('/').collect();
        let (file, dirs) = segments.split_last()?;
        if *file != self.application_data_file {
            return None;
        }
        dirs.last()
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
    }

    /// `<prototypes>/[group/...]<name>/<step dir>/...`
    ///
    /// A prototype may itself be named like a step directory
    /// (`prototypes/base/helm/helm/values.yaml` is prototype `helm`), so a
    /// step directory directly followed by another step directory is taken
    /// as the prototype name.
    pub fn match_prototype_step(&self, path: &str) -> Option<String> {
        let rest = strip_root(path, &self.prototypes_dir)?;
        let segments: Vec<&str> = rest.split('/').collect();
        let is_step = |segment: &str| self.step_dirs.iter().any(|step| step == segment);

        // The step directory needs a name before it and something inside it.
        let candidates: Vec<usize> = (1..segments.len().saturating_sub(1))
            .filter(|&i| is_step(segments[i]) && !segments[i - 1].is_empty())
            .collect();
        let step = candidates
            .iter()
            .find(|&&i| !is_step(segments[i + 1]))
            .or_else(|| candidates.first())?;
        Some(segments[step - 1].to_string())
    }
}

/// Returns what follows `<root>/` in `path`.
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    path.strip_prefix(root)?.strip_prefix('/')
}
