//! Naming conventions of the configuration tree.
//!
//! Every matcher in [`crate::patterns`] is derived from these names. Defaults
//! live here, in the caller layer; the pattern layer takes whatever it is given.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File looked up at the repository root when no `--config` is passed.
pub const DEFAULT_CONFIG_FILE: &str = ".impact-scope.yaml";

/// Directory and file names that give the tree its shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Conventions {
    /// Shared library code; any change here forces a full rebuild.
    pub library_dir: String,
    /// Root of all environments.
    pub environments_dir: String,
    /// Data file that marks (and configures) an environment directory.
    pub environment_data_file: String,
    /// Directory holding environment-wide templates, e.g. `envs/_env`.
    pub environment_global_dir: String,
    /// Directory holding per-application overrides inside an environment.
    pub applications_dir: String,
    /// Root of all prototypes.
    pub prototypes_dir: String,
    /// Data file of a prototype.
    pub application_data_file: String,
    pub ytt_step_dir: String,
    pub helm_step_dir: String,
    pub vendir_step_dir: String,
    pub ytt_pkg_step_dir: String,
    pub argocd_step_dir: String,
    /// Root of rendered output, one directory per environment id.
    pub rendered_dir: String,
    /// Branch compared against when running in CI.
    pub main_branch: String,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            library_dir: "lib".into(),
            environments_dir: "envs".into(),
            environment_data_file: "env-data.ytt.yaml".into(),
            environment_global_dir: "_env".into(),
            applications_dir: "_apps".into(),
            prototypes_dir: "prototypes".into(),
            application_data_file: "app-data.ytt.yaml".into(),
            ytt_step_dir: "ytt".into(),
            helm_step_dir: "helm".into(),
            vendir_step_dir: "vendir".into(),
            ytt_pkg_step_dir: "ytt-pkg".into(),
            argocd_step_dir: "argocd".into(),
            rendered_dir: "rendered/envs".into(),
            main_branch: "main".into(),
        }
    }
}

impl Conventions {
    /// Step directories that may appear directly inside a prototype.
    pub fn step_dirs(&self) -> [&str; 5] {
        [
            self.ytt_step_dir.as_str(),
            self.helm_step_dir.as_str(),
            self.vendir_step_dir.as_str(),
            self.ytt_pkg_step_dir.as_str(),
            self.argocd_step_dir.as_str(),
        ]
    }

    /// Loads conventions from `explicit`, or from [`DEFAULT_CONFIG_FILE`] under
    /// `root` if it exists, or falls back to the defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path: PathBuf = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = root.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    log::debug!("No {} found, using default conventions", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let conventions = Self::from_yaml(&source)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded conventions from {}", path.display());
        Ok(conventions)
    }

    /// Parses and validates a YAML document. Missing keys keep their defaults.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let conventions: Self = if source.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(source).context("Failed to parse conventions YAML")?
        };
        conventions.validate()?;
        Ok(conventions)
    }

    /// Rejects names that would make a matcher degenerate.
    ///
    /// Root directories may be nested paths (`deploy/envs`); everything else
    /// must be a single path segment.
    pub fn validate(&self) -> Result<()> {
        let roots = [
            ("libraryDir", &self.library_dir),
            ("environmentsDir", &self.environments_dir),
            ("prototypesDir", &self.prototypes_dir),
            ("renderedDir", &self.rendered_dir),
        ];
        for (key, value) in roots {
            if value.trim_matches('/').is_empty() {
                anyhow::bail!("'{}' must not be empty", key);
            }
            if value.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
                anyhow::bail!("'{}' must be a plain relative path, got '{}'", key, value);
            }
        }

        let segments = [
            ("environmentDataFile", &self.environment_data_file),
            ("environmentGlobalDir", &self.environment_global_dir),
            ("applicationsDir", &self.applications_dir),
            ("applicationDataFile", &self.application_data_file),
            ("yttStepDir", &self.ytt_step_dir),
            ("helmStepDir", &self.helm_step_dir),
            ("vendirStepDir", &self.vendir_step_dir),
            ("yttPkgStepDir", &self.ytt_pkg_step_dir),
            ("argocdStepDir", &self.argocd_step_dir),
        ];
        for (key, value) in segments {
            if value.is_empty() {
                anyhow::bail!("'{}' must not be empty", key);
            }
            if value.contains('/') {
                anyhow::bail!("'{}' must be a single path segment, got '{}'", key, value);
            }
        }

        // Environment discovery skips hidden and underscore-prefixed entries.
        if self.environment_data_file.starts_with(['.', '_']) {
            anyhow::bail!(
                "'environmentDataFile' must not start with '.' or '_', got '{}'",
                self.environment_data_file
            );
        }

        let mut seen = HashSet::new();
        for step in self.step_dirs() {
            if !seen.insert(step) {
                anyhow::bail!("Step directory '{}' is configured more than once", step);
            }
        }

        if self.main_branch.trim().is_empty() {
            anyhow::bail!("'mainBranch' must not be empty");
        }

        Ok(())
    }
}
