//! impact-scope library for incremental rendering of GitOps configuration trees.
//!
//! Given the files changed since a base revision, works out which
//! environments and applications need to be rendered again instead of
//! rendering the whole tree. The workflow has three phases:
//!
//! 1. **Collecting**: gather changed paths from git and build the
//!    environment inventory from the configuration tree
//! 2. **Classifying**: sort each changed path into a category (global,
//!    environment, application, prototype)
//! 3. **Resolving**: merge the categories into a [`RenderScope`]
//!
//! # Example
//!
//! ```no_run
//! use impact_scope::{ChangedPaths, Conventions, Inventory, PathPatterns, Resolver};
//! use impact_scope::inventory::CollectOptions;
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let conventions = Conventions::load(root, None).unwrap();
//! let inventory = Inventory::collect(root, &conventions, &CollectOptions::default()).unwrap();
//!
//! let changes: ChangedPaths = [("prototypes/base/api/helm/values.yaml", 'M')]
//!     .into_iter()
//!     .collect();
//!
//! let patterns = PathPatterns::new(&conventions);
//! let resolution = Resolver::new(&patterns, &inventory).resolve(&changes);
//! println!("{:?}", resolution.scope);
//! ```

pub mod changes;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod git;
pub mod inventory;
pub mod patterns;
pub mod pool;
pub mod resolver;
pub mod sets;
pub mod usage;

// Re-export commonly used types at crate root
pub use changes::{ChangeStatus, ChangedPath, ChangedPaths};
pub use config::Conventions;
pub use inventory::{Environment, Inventory, MissingApplication};
pub use patterns::{PathMatch, PathPatterns};
pub use resolver::{RenderScope, Resolution, Resolver};
