//! Change-impact resolution.
//!
//! Turns a set of changed paths into the narrowest [`RenderScope`] that still
//! covers every affected environment and application:
//!
//! 1. Any global change forces [`RenderScope::Everything`].
//! 2. A changed environment data file means the environment's application
//!    list may have changed, so whole environments are rebuilt.
//! 3. Otherwise only the applications changed directly, or through one of
//!    their prototypes, are rebuilt.
//!
//! Applications inside an environment whose data file was deleted are never
//! reported.

use crate::changes::ChangedPaths;
use crate::classifier::{Classifier, GlobalChange};
use crate::inventory::{Inventory, MissingApplication};
use crate::patterns::PathPatterns;
use crate::sets;
use crate::usage::PrototypeUsage;
use serde::Serialize;

/// What needs to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "kebab-case")]
pub enum RenderScope {
    /// Rebuild the whole tree.
    Everything,
    /// Rebuild every application in each listed environment.
    Environments { environments: Vec<String> },
    /// Rebuild exactly the listed applications. Both lists empty means
    /// nothing needs rendering.
    Applications {
        environments: Vec<String>,
        applications: Vec<String>,
    },
}

impl RenderScope {
    pub fn nothing() -> Self {
        Self::Applications {
            environments: Vec::new(),
            applications: Vec::new(),
        }
    }

    pub fn is_everything(&self) -> bool {
        matches!(self, Self::Everything)
    }

    pub fn is_nothing(&self) -> bool {
        matches!(
            self,
            Self::Applications { environments, applications }
                if environments.is_empty() && applications.is_empty()
        )
    }

    /// Listed environments; `None` for [`RenderScope::Everything`].
    pub fn environments(&self) -> Option<&[String]> {
        match self {
            Self::Everything => None,
            Self::Environments { environments } | Self::Applications { environments, .. } => {
                Some(environments)
            }
        }
    }

    /// Listed applications; `None` when every application of the listed
    /// environments (or of the whole tree) is to be rebuilt.
    pub fn applications(&self) -> Option<&[String]> {
        match self {
            Self::Applications { applications, .. } => Some(applications),
            _ => None,
        }
    }

    /// Adds applications that were expected in the rendered output but are
    /// absent, regardless of what changed.
    pub fn include_missing(self, missing: &[MissingApplication]) -> Self {
        if missing.is_empty() {
            return self;
        }
        let missing_envs = missing.iter().map(|m| m.environment.clone());
        match self {
            Self::Everything => Self::Everything,
            Self::Environments { environments } => Self::Environments {
                environments: sets::dedup_sorted(environments.into_iter().chain(missing_envs)),
            },
            Self::Applications {
                environments,
                applications,
            } => Self::Applications {
                environments: sets::dedup_sorted(environments.into_iter().chain(missing_envs)),
                applications: sets::dedup_sorted(
                    applications
                        .into_iter()
                        .chain(missing.iter().map(|m| m.application.clone())),
                ),
            },
        }
    }
}

/// Intermediate results of a resolution, for reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub changed_paths: usize,
    pub deleted_paths: usize,
    pub global_change: Option<GlobalChange>,
    pub modified_environments: Vec<String>,
    pub deleted_environments: Vec<String>,
    pub changed_applications: Vec<(String, String)>,
    pub changed_prototypes: Vec<String>,
    pub missing_applications: Vec<MissingApplication>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    #[serde(flatten)]
    pub scope: RenderScope,
    pub diagnostics: Diagnostics,
}

impl Resolution {
    /// Folds applications missing from the rendered output into the scope.
    pub fn with_missing(mut self, missing: Vec<MissingApplication>) -> Self {
        self.scope = self.scope.include_missing(&missing);
        self.diagnostics.missing_applications = missing;
        self
    }
}

/// Resolves change sets against one inventory snapshot.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    classifier: Classifier<'a>,
    usage: PrototypeUsage,
}

impl<'a> Resolver<'a> {
    pub fn new(patterns: &'a PathPatterns, inventory: &Inventory) -> Self {
        Self {
            classifier: Classifier::new(patterns),
            usage: PrototypeUsage::build(inventory),
        }
    }

    pub fn resolve(&self, changes: &ChangedPaths) -> Resolution {
        let partition = changes.partition();
        let mut diagnostics = Diagnostics {
            changed_paths: partition.all.len(),
            deleted_paths: partition.deleted.len(),
            ..Diagnostics::default()
        };

        if let Some(global) = self.classifier.global_change(&partition.all) {
            log::info!("Global change in {} ({}), rendering everything", global.path, global.kind);
            diagnostics.global_change = Some(global);
            return Resolution {
                scope: RenderScope::Everything,
                diagnostics,
            };
        }

        let modified_envs = sets::remove_sub_paths(self.classifier.environments(&partition.existing));
        let deleted_envs = self.classifier.environments(&partition.deleted);
        let changed_apps = sets::filter_deleted_envs(
            self.classifier.applications(&partition.all),
            &deleted_envs,
        );
        let prototypes = self.classifier.prototypes(&partition.all);
        let prototype_users =
            sets::filter_deleted_envs(self.usage.expand(&prototypes), &deleted_envs);

        let affected = changed_apps.iter().chain(&prototype_users);
        let scope = if !modified_envs.is_empty() {
            // The environment's own application list may have changed, so a
            // per-application scope cannot be trusted any more.
            RenderScope::Environments {
                environments: sets::dedup_sorted(
                    modified_envs
                        .iter()
                        .cloned()
                        .chain(affected.map(|(env, _)| env.clone())),
                ),
            }
        } else {
            RenderScope::Applications {
                environments: sets::dedup_sorted(affected.clone().map(|(env, _)| env.clone())),
                applications: sets::dedup_sorted(affected.map(|(_, app)| app.clone())),
            }
        };

        log::info!(
            "Detected changes in environments: {:?}, applications: {:?}",
            scope.environments().unwrap_or_default(),
            scope.applications()
        );

        diagnostics.modified_environments = sets::dedup_sorted(modified_envs);
        diagnostics.deleted_environments = sets::dedup_sorted(deleted_envs);
        diagnostics.changed_applications = changed_apps;
        diagnostics.changed_prototypes = sets::dedup_sorted(prototypes);

        Resolution { scope, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Conventions;
    use crate::inventory::Environment;

    fn inventory() -> Inventory {
        [
            Environment::new("envs/prod", "prod")
                .with_application("base/api", "api-app")
                .with_application("base/web", "web-app"),
            Environment::new("envs/staging", "staging").with_application("base/api", "api-staging"),
            Environment::new("envs/dev", "dev").with_application("tools/debug", "debug"),
        ]
        .into_iter()
        .collect()
    }

    fn changes(items: &[(&str, char)]) -> ChangedPaths {
        items.iter().copied().collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn resolve(items: &[(&str, char)]) -> RenderScope {
        let patterns = PathPatterns::new(&Conventions::default());
        let inventory = inventory();
        Resolver::new(&patterns, &inventory).resolve(&changes(items)).scope
    }

    #[test]
    fn library_change_rebuilds_everything() {
        assert_eq!(resolve(&[("lib/common.star", 'M')]), RenderScope::Everything);
    }

    #[test]
    fn global_change_wins_over_scoped_changes() {
        let scope = resolve(&[
            ("envs/prod/_apps/api-app/deploy.yaml", 'A'),
            ("envs/_env/ytt/overlay.yaml", 'D'),
            ("prototypes/base/api/helm/values.yaml", 'M'),
        ]);
        assert!(scope.is_everything());
        assert_eq!(scope.environments(), None);
        assert_eq!(scope.applications(), None);
    }

    #[test]
    fn base_environment_data_rebuilds_everything() {
        assert!(resolve(&[("envs/env-data.ytt.yaml", 'M')]).is_everything());
    }

    #[test]
    fn prototype_change_fans_out_to_users() {
        let scope = resolve(&[("prototypes/base/api/helm/values.yaml", 'M')]);
        assert_eq!(
            scope,
            RenderScope::Applications {
                environments: strings(&["envs/prod", "envs/staging"]),
                applications: strings(&["api-app", "api-staging"]),
            }
        );
    }

    #[test]
    fn application_change_is_scoped_to_application() {
        let scope = resolve(&[("envs/prod/_apps/api-app/deploy.yaml", 'A')]);
        assert_eq!(scope.environments(), Some(strings(&["envs/prod"]).as_slice()));
        assert_eq!(scope.applications(), Some(strings(&["api-app"]).as_slice()));
    }

    #[test]
    fn environment_data_change_downgrades_to_whole_environment() {
        let scope = resolve(&[
            ("envs/prod/env-data.ytt.yaml", 'M'),
            ("envs/dev/_apps/debug/values.yaml", 'M'),
        ]);
        assert_eq!(
            scope,
            RenderScope::Environments {
                environments: strings(&["envs/dev", "envs/prod"]),
            }
        );
        assert_eq!(scope.applications(), None);
    }

    #[test]
    fn deleted_environment_drops_its_applications() {
        let scope = resolve(&[
            ("envs/staging/env-data.ytt.yaml", 'D'),
            ("envs/staging/_apps/api-staging/values.yaml", 'D'),
            ("envs/prod/_apps/web-app/values.yaml", 'M'),
        ]);
        assert_eq!(
            scope,
            RenderScope::Applications {
                environments: strings(&["envs/prod"]),
                applications: strings(&["web-app"]),
            }
        );
    }

    #[test]
    fn deleted_environment_is_not_reached_through_its_prototype() {
        let patterns = PathPatterns::new(&Conventions::default());
        let inventory = inventory();
        let resolution = Resolver::new(&patterns, &inventory).resolve(&changes(&[
            ("envs/dev/env-data.ytt.yaml", 'D'),
            ("prototypes/tools/debug/ytt/job.yaml", 'M'),
        ]));
        assert!(resolution.scope.is_nothing());
        assert_eq!(resolution.diagnostics.deleted_environments, strings(&["envs/dev"]));
        assert_eq!(resolution.diagnostics.changed_prototypes, strings(&["debug"]));
    }

    #[test]
    fn prototype_fan_out_skips_only_deleted_environments() {
        let scope = resolve(&[
            ("envs/staging/env-data.ytt.yaml", 'D'),
            ("prototypes/base/api/helm/values.yaml", 'M'),
        ]);
        assert_eq!(
            scope,
            RenderScope::Applications {
                environments: strings(&["envs/prod"]),
                applications: strings(&["api-app"]),
            }
        );
    }

    #[test]
    fn deleted_prototype_files_still_fan_out() {
        let scope = resolve(&[("prototypes/tools/debug/ytt/job.yaml", 'D')]);
        assert_eq!(scope.applications(), Some(strings(&["debug"]).as_slice()));
    }

    #[test]
    fn nested_environment_changes_collapse_to_ancestor() {
        let patterns = PathPatterns::new(&Conventions::default());
        let inventory = inventory();
        let resolution = Resolver::new(&patterns, &inventory).resolve(&changes(&[
            ("envs/prod/env-data.ytt.yaml", 'M'),
            ("envs/prod/eu/env-data.ytt.yaml", 'M'),
            ("envs/prod-us/env-data.ytt.yaml", 'A'),
        ]));
        assert_eq!(
            resolution.diagnostics.modified_environments,
            strings(&["envs/prod", "envs/prod-us"])
        );
        assert_eq!(
            resolution.scope,
            RenderScope::Environments {
                environments: strings(&["envs/prod", "envs/prod-us"]),
            }
        );
    }

    #[test]
    fn unrelated_changes_resolve_to_nothing() {
        let scope = resolve(&[("README.md", 'M'), (".github/workflows/ci.yaml", 'A')]);
        assert!(scope.is_nothing());
        assert!(!scope.is_everything());
        assert_eq!(scope.environments(), Some(&[][..]));
    }

    #[test]
    fn resolution_is_idempotent() {
        let items = [
            ("prototypes/base/api/helm/values.yaml", 'M'),
            ("envs/dev/_apps/debug/values.yaml", 'M'),
        ];
        assert_eq!(resolve(&items), resolve(&items));
    }

    #[test]
    fn missing_applications_extend_application_scope() {
        let missing = vec![MissingApplication {
            environment: "envs/dev".into(),
            application: "debug".into(),
        }];
        let scope = RenderScope::Applications {
            environments: strings(&["envs/prod"]),
            applications: strings(&["web-app"]),
        }
        .include_missing(&missing);
        assert_eq!(
            scope,
            RenderScope::Applications {
                environments: strings(&["envs/dev", "envs/prod"]),
                applications: strings(&["debug", "web-app"]),
            }
        );
        assert_eq!(
            RenderScope::nothing().include_missing(&missing).applications(),
            Some(strings(&["debug"]).as_slice())
        );
    }

    #[test]
    fn missing_applications_keep_environment_scope_unrestricted() {
        let missing = vec![MissingApplication {
            environment: "envs/dev".into(),
            application: "debug".into(),
        }];
        let scope = RenderScope::Environments {
            environments: strings(&["envs/prod"]),
        }
        .include_missing(&missing);
        assert_eq!(
            scope,
            RenderScope::Environments {
                environments: strings(&["envs/dev", "envs/prod"]),
            }
        );
        assert!(RenderScope::Everything.include_missing(&missing).is_everything());
    }

    #[test]
    fn resolution_records_missing_applications() {
        let patterns = PathPatterns::new(&Conventions::default());
        let inventory = inventory();
        let missing = vec![MissingApplication {
            environment: "envs/staging".into(),
            application: "api-staging".into(),
        }];
        let resolution = Resolver::new(&patterns, &inventory)
            .resolve(&changes(&[("envs/prod/_apps/web-app/values.yaml", 'M')]))
            .with_missing(missing.clone());
        assert_eq!(resolution.diagnostics.missing_applications, missing);
        assert_eq!(
            resolution.scope.applications(),
            Some(strings(&["api-staging", "web-app"]).as_slice())
        );
    }

    #[test]
    fn scope_serializes_with_tag() {
        let json = serde_json::to_string(&RenderScope::Environments {
            environments: strings(&["envs/prod"]),
        })
        .unwrap();
        insta::assert_snapshot!(json, @r#"{"scope":"environments","environments":["envs/prod"]}"#);
    }
}
