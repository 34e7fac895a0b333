//! Environment inventory.
//!
//! Walks the environments directory for environment data files, loads each
//! one, and records which applications (and from which prototypes) every
//! environment declares. The inventory is a snapshot; it is rebuilt on every
//! run.

use crate::config::Conventions;
use crate::pool;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An application instantiated from a prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    /// Prototype identifier, possibly namespaced (`group/base-app`).
    pub prototype: String,
    /// Name unique within the environment.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    /// Directory of the environment, relative to the repository root.
    pub path: String,
    /// Identifier used for the rendered output directory.
    pub id: String,
    pub applications: Vec<Application>,
}

impl Environment {
    pub fn new(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            applications: Vec::new(),
        }
    }

    pub fn with_application(mut self, prototype: &str, name: &str) -> Self {
        self.applications.push(Application {
            prototype: prototype.to_string(),
            name: name.to_string(),
        });
        self
    }
}

/// An application that is declared but has no rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingApplication {
    pub environment: String,
    pub application: String,
}

/// All environments keyed by path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    environments: BTreeMap<String, Environment>,
}

/// Options for [`Inventory::collect`].
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Worker threads used to load environment data; 0 loads sequentially.
    pub jobs: usize,
    /// Glob patterns matched against entry names and root-relative paths.
    pub exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvironmentData {
    #[serde(default)]
    environment: Option<EnvironmentSection>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvironmentSection {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    applications: Vec<ApplicationEntry>,
}

#[derive(Debug, Deserialize)]
struct ApplicationEntry {
    proto: String,
    #[serde(default)]
    name: Option<String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, environment: Environment) {
        self.environments.insert(environment.path.clone(), environment);
    }

    pub fn get(&self, path: &str) -> Option<&Environment> {
        self.environments.get(path)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    pub fn environments(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    /// Builds the inventory for the repository at `root`.
    ///
    /// Fails as a whole if any environment data file cannot be read or parsed.
    pub fn collect(root: &Path, conventions: &Conventions, options: &CollectOptions) -> Result<Self> {
        let excludes = compile_excludes(&options.exclude)?;
        let data_files = find_environment_data_files(root, conventions, &excludes)?;
        log::debug!("Found {} environment data files", data_files.len());

        let loaded = pool::try_map(options.jobs, data_files, |file| load_environment(root, &file))?;

        let mut inventory = Self::new();
        for environment in loaded.into_iter().flatten() {
            inventory.insert(environment);
        }
        log::info!("Collected {} environments", inventory.len());
        Ok(inventory)
    }

    /// Applications whose `<rendered dir>/<environment id>/<name>` directory
    /// does not exist under `root`.
    pub fn missing_applications(&self, root: &Path, rendered_dir: &str) -> Vec<MissingApplication> {
        let rendered = root.join(rendered_dir);
        let mut missing = Vec::new();
        for env in self.environments() {
            for app in &env.applications {
                if !rendered.join(&env.id).join(&app.name).is_dir() {
                    log::debug!("Application {} in {} has no rendered output", app.name, env.path);
                    missing.push(MissingApplication {
                        environment: env.path.clone(),
                        application: app.name.clone(),
                    });
                }
            }
        }
        missing
    }
}

impl FromIterator<Environment> for Inventory {
    fn from_iter<I: IntoIterator<Item = Environment>>(iter: I) -> Self {
        let mut inventory = Self::new();
        for env in iter {
            inventory.insert(env);
        }
        inventory
    }
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("Invalid exclude pattern '{}'", p)))
        .collect()
}

/// Lists environment data files below the environments directory, skipping
/// hidden and underscore-prefixed entries. The data file directly inside the
/// environments directory is shared by all environments and is not listed.
fn find_environment_data_files(
    root: &Path,
    conventions: &Conventions,
    excludes: &[glob::Pattern],
) -> Result<Vec<PathBuf>> {
    let base = root.join(&conventions.environments_dir);
    if !base.is_dir() {
        log::warn!("Environments directory {} does not exist", base.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(is_hidden_or_underscore(e) || is_excluded(root, e, excludes)))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
        if entry.depth() > 1
            && entry.file_type().is_file()
            && entry.file_name() == conventions.environment_data_file.as_str()
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_hidden_or_underscore(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.') || s.starts_with('_'))
}

fn is_excluded(root: &Path, entry: &walkdir::DirEntry, excludes: &[glob::Pattern]) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    let relative = relative_path(root, entry.path());
    excludes
        .iter()
        .any(|p| p.matches(&name) || p.matches(&relative))
}

/// Root-relative, `/`-separated form of `path`.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Loads one environment data file. Returns `None` for directories that only
/// carry shared data (no `environment.id`).
fn load_environment(root: &Path, file: &Path) -> Result<Option<Environment>> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let dir = file.parent().unwrap_or(root);
    let path = relative_path(root, dir);

    let Some(section) = parse_environment_data(&source)
        .with_context(|| format!("Failed to parse {}", file.display()))?
    else {
        log::debug!("{} declares no environment, treating it as shared data", file.display());
        return Ok(None);
    };
    let Some(id) = section.id.filter(|id| !id.is_empty()) else {
        log::debug!("{} has no environment id, treating it as shared data", file.display());
        return Ok(None);
    };

    let mut environment = Environment::new(path, id);
    let mut names = HashSet::new();
    for entry in section.applications {
        let name = entry
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_application_name(&entry.proto));
        if !names.insert(name.clone()) {
            anyhow::bail!(
                "Application '{}' is declared more than once in {}",
                name,
                file.display()
            );
        }
        environment.applications.push(Application {
            prototype: entry.proto,
            name,
        });
    }

    log::debug!(
        "Loaded environment {} ({}) with {} applications",
        environment.id,
        environment.path,
        environment.applications.len()
    );
    Ok(Some(environment))
}

/// Data files may hold several YAML documents; the first one with an
/// `environment` section is used.
fn parse_environment_data(source: &str) -> Result<Option<EnvironmentSection>> {
    for document in serde_yaml::Deserializer::from_str(source) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let data: EnvironmentData = serde_yaml::from_value(value)?;
        if let Some(section) = data.environment {
            return Ok(Some(section));
        }
    }
    Ok(None)
}

fn default_application_name(prototype: &str) -> String {
    prototype
        .rsplit('/')
        .next()
        .unwrap_or(prototype)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    #[test]
    fn parses_applications_with_default_names() {
        let source = r#"
#@data/values
---
environment:
  id: prod
  applications:
    - proto: base/api
      name: api-app
    - proto: group/web
"#;
        let section = parse_environment_data(source).unwrap().unwrap();
        assert_eq!(section.id.as_deref(), Some("prod"));
        assert_eq!(section.applications.len(), 2);
        assert_eq!(default_application_name(&section.applications[1].proto), "web");
    }

    #[test]
    fn empty_document_has_no_environment() {
        assert!(parse_environment_data("").unwrap().is_none());
        assert!(parse_environment_data("other: 1\n").unwrap().is_none());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(parse_environment_data("environment: [unclosed\n").is_err());
    }

    #[test]
    fn collect_finds_environments_and_skips_group_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "envs/env-data.ytt.yaml", "environment:\n  id: base\n");
        write(root, "envs/prod/env-data.ytt.yaml", "shared: true\n");
        write(
            root,
            "envs/prod/eu/env-data.ytt.yaml",
            "environment:\n  id: prod-eu\n  applications:\n    - proto: base/api\n",
        );
        write(
            root,
            "envs/dev/env-data.ytt.yaml",
            "environment:\n  id: dev\n  applications:\n    - proto: base/api\n      name: api-dev\n",
        );
        write(root, "envs/_env/env-data.ytt.yaml", "environment:\n  id: hidden\n");

        for jobs in [0, 4] {
            let options = CollectOptions {
                jobs,
                ..CollectOptions::default()
            };
            let inventory = Inventory::collect(root, &Conventions::default(), &options).unwrap();
            let paths: Vec<_> = inventory.environments().map(|e| e.path.as_str()).collect();
            assert_eq!(paths, vec!["envs/dev", "envs/prod/eu"]);
            assert_eq!(inventory.get("envs/prod/eu").unwrap().applications[0].name, "api");
            assert_eq!(inventory.get("envs/dev").unwrap().id, "dev");
        }
    }

    #[test]
    fn collect_honours_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "envs/prod/env-data.ytt.yaml", "environment:\n  id: prod\n");
        write(root, "envs/scratch/env-data.ytt.yaml", "environment:\n  id: scratch\n");
        let options = CollectOptions {
            jobs: 0,
            exclude: vec!["scratch".to_string()],
        };
        let inventory = Inventory::collect(root, &Conventions::default(), &options).unwrap();
        assert_eq!(inventory.len(), 1);
        assert!(inventory.get("envs/prod").is_some());
    }

    #[test]
    fn collect_fails_on_broken_environment() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "envs/prod/env-data.ytt.yaml", "environment:\n  id: prod\n");
        write(root, "envs/dev/env-data.ytt.yaml", "environment: [\n");
        let options = CollectOptions {
            jobs: 2,
            ..CollectOptions::default()
        };
        let err = Inventory::collect(root, &Conventions::default(), &options).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn collect_rejects_duplicate_application_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "envs/prod/env-data.ytt.yaml",
            "environment:\n  id: prod\n  applications:\n    - proto: a/api\n    - proto: b/api\n",
        );
        let err = Inventory::collect(root, &Conventions::default(), &CollectOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn collect_without_environments_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let inventory =
            Inventory::collect(dir.path(), &Conventions::default(), &CollectOptions::default())
                .unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn missing_applications_checks_rendered_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("rendered/envs/prod/api")).unwrap();
        let inventory: Inventory = [Environment::new("envs/prod", "prod")
            .with_application("base/api", "api")
            .with_application("base/web", "web")]
        .into_iter()
        .collect();
        let missing = inventory.missing_applications(root, "rendered/envs");
        assert_eq!(
            missing,
            vec![MissingApplication {
                environment: "envs/prod".to_string(),
                application: "web".to_string(),
            }]
        );
    }
}
