// src/catalog/expand.rs

//! Bundle expansion
//!
//! Depth-first and order-preserving: included bundles are expanded first,
//! then the bundle's own list is appended, then the result is deduplicated
//! keeping the first occurrence. Cycle detection uses a visited set scoped to
//! the current recursion path, so diamonds (A includes B and C, both include
//! D) are legal while A -> B -> A is not.

use crate::catalog::{Bundle, Catalog};
use crate::error::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Flatten a bundle into its ordered, deduplicated tool list
pub fn expand_tools(catalog: &Catalog, bundle: &str) -> Result<Vec<String>> {
    let tools = expand_with(catalog, bundle, Field::Tools)?;
    debug!("Bundle '{}' expands to {} tools", bundle, tools.len());
    Ok(tools)
}

/// Flatten a bundle into its system packages for one package manager
///
/// Each bundle contributes its `manager`-specific list when it has one and
/// its generic `packages` list otherwise.
pub fn expand_system_packages(
    catalog: &Catalog,
    bundle: &str,
    manager: &str,
) -> Result<Vec<String>> {
    let packages = expand_with(catalog, bundle, Field::SystemPackages(manager))?;
    debug!(
        "Bundle '{}' expands to {} {} packages",
        bundle,
        packages.len(),
        manager
    );
    Ok(packages)
}

/// Which list a bundle contributes during expansion
#[derive(Debug, Clone, Copy)]
enum Field<'m> {
    Tools,
    SystemPackages(&'m str),
}

impl Field<'_> {
    fn select<'b>(&self, bundle: &'b Bundle) -> &'b [String] {
        match self {
            Field::Tools => &bundle.tools,
            Field::SystemPackages(manager) => bundle.system_packages_for(manager),
        }
    }
}

fn expand_with(catalog: &Catalog, bundle: &str, field: Field<'_>) -> Result<Vec<String>> {
    expand_recursive(catalog, bundle, HashSet::new(), Vec::new(), field)
}

/// `visited` and `trail` are owned per call; siblings never see each other's path
fn expand_recursive(
    catalog: &Catalog,
    name: &str,
    mut visited: HashSet<String>,
    mut trail: Vec<String>,
    field: Field<'_>,
) -> Result<Vec<String>> {
    trail.push(name.to_string());
    if !visited.insert(name.to_string()) {
        return Err(Error::CircularBundle {
            bundle: trail[0].clone(),
            path: trail,
        });
    }

    let bundle = catalog
        .bundle(name)
        .ok_or_else(|| Error::BundleNotFound(name.to_string()))?;

    let mut items = Vec::new();
    for included in &bundle.bundles {
        items.extend(expand_recursive(
            catalog,
            included,
            visited.clone(),
            trail.clone(),
            field,
        )?);
    }
    items.extend(field.select(bundle).iter().cloned());

    Ok(dedup_preserving_order(items))
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(name: &str, tools: &[&str], includes: &[&str]) -> Bundle {
        let mut bundle = Bundle::new(name);
        bundle.tools = tools.iter().map(|t| t.to_string()).collect();
        bundle.bundles = includes.iter().map(|b| b.to_string()).collect();
        bundle
    }

    fn catalog(bundles: Vec<Bundle>) -> Catalog {
        let mut catalog = Catalog::new();
        for b in bundles {
            catalog.insert_bundle(b);
        }
        catalog
    }

    #[test]
    fn test_flat_bundle() {
        let catalog = catalog(vec![bundle("search", &["ripgrep", "fd"], &[])]);
        assert_eq!(expand_tools(&catalog, "search").unwrap(), vec!["ripgrep", "fd"]);
    }

    #[test]
    fn test_includes_come_first() {
        let catalog = catalog(vec![
            bundle("core", &["git", "make"], &[]),
            bundle("rust-dev", &["cargo-edit", "git"], &["core"]),
        ]);
        assert_eq!(
            expand_tools(&catalog, "rust-dev").unwrap(),
            vec!["git", "make", "cargo-edit"]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let catalog = catalog(vec![bundle("a", &["x"], &["b"]), bundle("b", &["y"], &["a"])]);
        match expand_tools(&catalog, "a").unwrap_err() {
            Error::CircularBundle { bundle, path } => {
                assert_eq!(bundle, "a");
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_self_include_is_a_cycle() {
        let catalog = catalog(vec![bundle("a", &["x"], &["a"])]);
        assert!(matches!(
            expand_tools(&catalog, "a"),
            Err(Error::CircularBundle { .. })
        ));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let catalog = catalog(vec![
            bundle("a", &["top"], &["b", "c"]),
            bundle("b", &["left"], &["d"]),
            bundle("c", &["right"], &["d"]),
            bundle("d", &["shared"], &[]),
        ]);
        let tools = expand_tools(&catalog, "a").unwrap();
        assert_eq!(tools, vec!["shared", "left", "right", "top"]);
        assert_eq!(tools.iter().filter(|t| *t == "shared").count(), 1);
    }

    #[test]
    fn test_missing_bundle() {
        let catalog = catalog(vec![bundle("a", &[], &["ghost"])]);
        match expand_tools(&catalog, "a").unwrap_err() {
            Error::BundleNotFound(name) => assert_eq!(name, "ghost"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(
            expand_tools(&catalog, "nope"),
            Err(Error::BundleNotFound(_))
        ));
    }

    #[test]
    fn test_system_packages_dedup_and_fallback() {
        let mut base = bundle("base", &[], &[]);
        base.packages = vec!["curl".to_string(), "pkg-config".to_string()];

        let mut web = bundle("web", &[], &["base"]);
        web.packages = vec!["nodejs".to_string()];
        web.system_packages.insert(
            "apt".to_string(),
            vec!["pkg-config".to_string(), "libssl-dev".to_string()],
        );

        let catalog = catalog(vec![base, web]);
        assert_eq!(
            expand_system_packages(&catalog, "web", "apt").unwrap(),
            vec!["curl", "pkg-config", "libssl-dev"]
        );
        assert_eq!(
            expand_system_packages(&catalog, "web", "dnf").unwrap(),
            vec!["curl", "pkg-config", "nodejs"]
        );
    }
}
