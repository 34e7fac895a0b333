//! Applies path matchers to collections of changed paths.
//!
//! Every match is kept, including repeats from different paths; callers
//! deduplicate.

use crate::patterns::{GlobalKind, PathPatterns};
use serde::Serialize;

/// The first path that touched a shared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalChange {
    pub path: String,
    pub kind: GlobalKind,
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    patterns: &'a PathPatterns,
}

impl<'a> Classifier<'a> {
    pub fn new(patterns: &'a PathPatterns) -> Self {
        Self { patterns }
    }

    /// Stops at the first path that matches any global matcher.
    pub fn global_change(&self, paths: &[&str]) -> Option<GlobalChange> {
        paths.iter().find_map(|path| {
            let kind = self.patterns.match_global(path)?;
            log::debug!("{} is a global change ({})", path, kind);
            Some(GlobalChange {
                path: path.to_string(),
                kind,
            })
        })
    }

    /// Environment paths captured from environment data files.
    pub fn environments(&self, paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .filter_map(|path| {
                let env = self.patterns.match_environment_data(path)?;
                log::debug!("{} changes environment {}", path, env);
                Some(env)
            })
            .collect()
    }

    /// `(environment, application)` pairs captured from application directories.
    pub fn applications(&self, paths: &[&str]) -> Vec<(String, String)> {
        paths
            .iter()
            .filter_map(|path| {
                let (env, app) = self.patterns.match_application(path)?;
                log::debug!("{} changes application {} in {}", path, app, env);
                Some((env, app))
            })
            .collect()
    }

    /// Prototype names, data-file matches first, then step-directory matches.
    pub fn prototypes(&self, paths: &[&str]) -> Vec<String> {
        let from_data = paths
            .iter()
            .filter_map(|path| self.patterns.match_prototype_data(path).map(|name| (path, name)));
        let from_steps = paths
            .iter()
            .filter_map(|path| self.patterns.match_prototype_step(path).map(|name| (path, name)));
        from_data
            .chain(from_steps)
            .map(|(path, name)| {
                log::debug!("{} changes prototype {}", path, name);
                name
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Conventions;

    fn patterns() -> PathPatterns {
        PathPatterns::new(&Conventions::default())
    }

    #[test]
    fn global_change_reports_first_match() {
        let p = patterns();
        let classifier = Classifier::new(&p);
        let change = classifier
            .global_change(&["README.md", "envs/env-data.ytt.yaml", "lib/x.star"])
            .unwrap();
        assert_eq!(change.path, "envs/env-data.ytt.yaml");
        assert_eq!(change.kind, GlobalKind::BaseData);
    }

    #[test]
    fn global_change_none_for_scoped_changes() {
        let p = patterns();
        let classifier = Classifier::new(&p);
        assert!(
            classifier
                .global_change(&["envs/prod/env-data.ytt.yaml", "prototypes/api/helm/v.yaml"])
                .is_none()
        );
    }

    #[test]
    fn environments_keeps_repeats() {
        let p = patterns();
        let classifier = Classifier::new(&p);
        let envs = classifier.environments(&[
            "envs/prod/env-data.ytt.yaml",
            "docs/index.md",
            "envs/dev/env-data.ytt.yaml",
            "envs/prod/env-data.ytt.yaml",
        ]);
        assert_eq!(envs, vec!["envs/prod", "envs/dev", "envs/prod"]);
    }

    #[test]
    fn applications_pairs_environment_and_name() {
        let p = patterns();
        let classifier = Classifier::new(&p);
        let apps = classifier.applications(&[
            "envs/prod/_apps/api/a.yaml",
            "envs/prod/_apps/api/b.yaml",
            "envs/dev/_apps/web/a.yaml",
        ]);
        assert_eq!(
            apps,
            vec![
                ("envs/prod".to_string(), "api".to_string()),
                ("envs/prod".to_string(), "api".to_string()),
                ("envs/dev".to_string(), "web".to_string()),
            ]
        );
    }

    #[test]
    fn prototypes_lists_data_matches_first() {
        let p = patterns();
        let classifier = Classifier::new(&p);
        let protos = classifier.prototypes(&[
            "prototypes/base/api/helm/values.yaml",
            "prototypes/web/app-data.ytt.yaml",
            "prototypes/notes.md",
        ]);
        assert_eq!(protos, vec!["web", "api"]);
    }
}
