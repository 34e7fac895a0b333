//! Prototype usage index.
//!
//! Maps every prototype identifier found in the inventory to the
//! environments and applications derived from it, so that a prototype change
//! can be fanned out to its users.

use crate::inventory::Inventory;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct PrototypeUsage {
    users: BTreeMap<String, Vec<(String, String)>>,
}

impl PrototypeUsage {
    pub fn build(inventory: &Inventory) -> Self {
        let mut users: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for env in inventory.environments() {
            for app in &env.applications {
                users
                    .entry(app.prototype.clone())
                    .or_default()
                    .push((env.path.clone(), app.name.clone()));
            }
        }
        Self { users }
    }

    /// Returns the `(environment, application)` users of every prototype
    /// whose identifier equals one of `changed` or ends with `/` followed by
    /// it. Pairs are deduplicated and sorted.
    pub fn expand(&self, changed: &[String]) -> Vec<(String, String)> {
        let mut pairs = BTreeSet::new();

        for name in changed {
            let suffix = format!("/{}", name);
            for (prototype, users) in &self.users {
                if prototype == name || prototype.ends_with(&suffix) {
                    log::debug!("Prototype {} is used by {} applications", prototype, users.len());
                    pairs.extend(users.iter().cloned());
                }
            }
        }

        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Environment;

    fn inventory() -> Inventory {
        [
            Environment::new("envs/prod", "prod")
                .with_application("base/api", "api-app")
                .with_application("web", "web"),
            Environment::new("envs/dev", "dev")
                .with_application("other/api", "api-dev")
                .with_application("base/api-gateway", "gateway"),
        ]
        .into_iter()
        .collect()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(env, app)| (env.to_string(), app.to_string()))
            .collect()
    }

    #[test]
    fn bare_name_matches_namespaced_prototypes() {
        let usage = PrototypeUsage::build(&inventory()).expand(&names(&["api"]));
        assert_eq!(usage, pairs(&[("envs/dev", "api-dev"), ("envs/prod", "api-app")]));
    }

    #[test]
    fn full_identifier_matches_exactly() {
        let usage = PrototypeUsage::build(&inventory()).expand(&names(&["base/api"]));
        assert_eq!(usage, pairs(&[("envs/prod", "api-app")]));
    }

    #[test]
    fn suffix_match_respects_segments() {
        let usage = PrototypeUsage::build(&inventory()).expand(&names(&["gateway"]));
        assert!(usage.is_empty());
        let usage = PrototypeUsage::build(&inventory()).expand(&names(&["api-gateway"]));
        assert_eq!(usage, pairs(&[("envs/dev", "gateway")]));
    }

    #[test]
    fn unknown_prototype_reaches_nothing() {
        assert!(PrototypeUsage::build(&inventory()).expand(&names(&["db"])).is_empty());
    }

    #[test]
    fn repeated_changes_are_deduplicated() {
        let usage = PrototypeUsage::build(&inventory()).expand(&names(&["web", "web"]));
        assert_eq!(usage, pairs(&[("envs/prod", "web")]));
    }
}
