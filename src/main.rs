//! impact-scope: work out what to re-render in a GitOps configuration tree.
//!
//! Reads the changed files from git, classifies them against the tree's
//! naming conventions, and prints the environments and applications that
//! need rendering.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use impact_scope::cli::{Args, ChangeArgs, Commands, InventoryArgs, RepoArgs};
use impact_scope::git::{self, BaseRevision};
use impact_scope::inventory::CollectOptions;
use impact_scope::{ChangedPaths, Conventions, Inventory, PathPatterns, RenderScope, Resolution, Resolver};
use std::path::Path;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Resolve {
            repo,
            changes,
            inventory,
            no_missing,
            json,
        } => cmd_resolve(&repo, &changes, &inventory, no_missing, json, args.verbose),
        Commands::Changes { repo, changes, json } => cmd_changes(&repo, &changes, json),
        Commands::Inventory {
            repo,
            inventory,
            missing,
            json,
        } => cmd_inventory(&repo, &inventory, missing, json),
        Commands::Classify { repo, paths } => cmd_classify(&repo, &paths),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn cmd_resolve(
    repo: &RepoArgs,
    change_args: &ChangeArgs,
    inventory_args: &InventoryArgs,
    no_missing: bool,
    json_output: bool,
    verbose: bool,
) -> Result<()> {
    let conventions = Conventions::load(&repo.root, repo.config.as_deref())?;
    let inventory = collect_inventory(&repo.root, &conventions, inventory_args)?;
    if verbose {
        eprintln!(
            "{} Inventory contains {} environments",
            "info:".blue().bold(),
            inventory.len()
        );
    }

    let changes = collect_changes(&repo.root, &conventions, change_args)?;
    if verbose {
        eprintln!(
            "{} Found {} changed paths",
            "info:".blue().bold(),
            changes.len()
        );
    }

    let patterns = PathPatterns::new(&conventions);
    let mut resolution = Resolver::new(&patterns, &inventory).resolve(&changes);

    if !no_missing {
        let missing = inventory.missing_applications(&repo.root, &conventions.rendered_dir);
        if verbose && !missing.is_empty() {
            eprintln!(
                "{} {} applications have no rendered output",
                "info:".blue().bold(),
                missing.len()
            );
        }
        resolution = resolution.with_missing(missing);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print_resolution(&resolution, verbose);
    }

    Ok(())
}

fn cmd_changes(repo: &RepoArgs, change_args: &ChangeArgs, json_output: bool) -> Result<()> {
    let conventions = Conventions::load(&repo.root, repo.config.as_deref())?;
    let changes = collect_changes(&repo.root, &conventions, change_args)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&changes.to_vec())?);
        return Ok(());
    }

    if changes.is_empty() {
        println!("{} No changed paths", "ok:".green().bold());
        return Ok(());
    }

    println!("{} changed path(s):", changes.len());
    for (path, status) in changes.iter() {
        let code = status.to_string();
        let code = if status.is_deletion() {
            code.red()
        } else {
            code.yellow()
        };
        println!("  {} {}", code, path);
    }

    Ok(())
}

fn cmd_inventory(
    repo: &RepoArgs,
    inventory_args: &InventoryArgs,
    show_missing: bool,
    json_output: bool,
) -> Result<()> {
    let conventions = Conventions::load(&repo.root, repo.config.as_deref())?;
    let inventory = collect_inventory(&repo.root, &conventions, inventory_args)?;

    let missing = if show_missing {
        inventory.missing_applications(&repo.root, &conventions.rendered_dir)
    } else {
        Vec::new()
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    if inventory.is_empty() {
        println!("{} No environments found", "warn:".yellow().bold());
        return Ok(());
    }

    for env in inventory.environments() {
        println!("{} {}", env.path, format!("({})", env.id).dimmed());
        for app in &env.applications {
            let is_missing = missing
                .iter()
                .any(|m| m.environment == env.path && m.application == app.name);
            if is_missing {
                println!(
                    "  {} {} {}",
                    app.name.red(),
                    app.prototype.dimmed(),
                    "(not rendered)".red()
                );
            } else {
                println!("  {} {}", app.name, app.prototype.dimmed());
            }
        }
    }

    Ok(())
}

fn cmd_classify(repo: &RepoArgs, paths: &[String]) -> Result<()> {
    let conventions = Conventions::load(&repo.root, repo.config.as_deref())?;
    let patterns = PathPatterns::new(&conventions);

    for path in paths {
        match patterns.classify(path) {
            Some(category) => println!("  {} {} {}", path, "->".green(), category),
            None => println!("  {} {}", path, "(unrecognized)".dimmed()),
        }
    }

    Ok(())
}

fn collect_inventory(root: &Path, conventions: &Conventions, args: &InventoryArgs) -> Result<Inventory> {
    let options = CollectOptions {
        jobs: args.jobs,
        exclude: args.exclude.clone(),
    };
    Inventory::collect(root, conventions, &options)
}

fn collect_changes(root: &Path, conventions: &Conventions, args: &ChangeArgs) -> Result<ChangedPaths> {
    if !args.changes.is_empty() {
        return Ok(args.changes.iter().cloned().collect());
    }

    let base = match (&args.base, args.no_diff) {
        (_, true) => BaseRevision::None,
        (Some(r), false) => BaseRevision::Explicit(r.clone()),
        (None, false) => BaseRevision::Detect {
            main_branch: conventions.main_branch.clone(),
        },
    };
    git::changed_paths(root, &base)
}

fn print_resolution(resolution: &Resolution, verbose: bool) {
    let d = &resolution.diagnostics;

    if verbose {
        println!(
            "\n{} Paths: {} ({} deleted), Environments: {} modified, {} deleted",
            "Diagnostics:".bold(),
            d.changed_paths,
            d.deleted_paths,
            d.modified_environments.len(),
            d.deleted_environments.len()
        );
        println!(
            "             Applications: {}, Prototypes: {}, Missing: {}",
            d.changed_applications.len(),
            d.changed_prototypes.len(),
            d.missing_applications.len()
        );
    }

    match &resolution.scope {
        RenderScope::Everything => {
            if let Some(global) = &d.global_change {
                println!(
                    "{} {} changed ({})",
                    "Global:".red().bold(),
                    global.path,
                    global.kind
                );
            }
            println!("{} Render everything", "scope:".cyan().bold());
        }
        scope if scope.is_nothing() => {
            println!("{} Nothing to render", "ok:".green().bold());
        }
        RenderScope::Environments { environments } => {
            println!(
                "{} {} environment(s), all applications:\n",
                "scope:".cyan().bold(),
                environments.len()
            );
            for env in environments {
                println!("  {}", env);
            }
        }
        RenderScope::Applications {
            environments,
            applications,
        } => {
            println!(
                "{} {} application(s) in {} environment(s):\n",
                "scope:".cyan().bold(),
                applications.len(),
                environments.len()
            );
            for env in environments {
                println!("  {}", env);
            }
            for app in applications {
                println!("    {} {}", "->".green(), app);
            }
        }
    }
}
