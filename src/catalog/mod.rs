// src/catalog/mod.rs

//! Read-only tool and bundle catalog
//!
//! The catalog is authored elsewhere and consumed here as TOML:
//!
//! ```toml
//! [tools.ripgrep]
//! language = "rust"
//! package = "ripgrep"
//! binary = "rg"
//!
//! [bundles.search]
//! description = "Fast search tools"
//! tools = ["ripgrep", "fd"]
//! bundles = ["core"]
//! packages = ["pkg-config"]
//!
//! [bundles.search.system_packages]
//! apt = ["pkg-config", "libssl-dev"]
//! ```
//!
//! Nothing beyond deserialization is validated.

pub mod expand;

pub use expand::{expand_system_packages, expand_tools};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One installable tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Package name for the language package manager, if it differs from the tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Binary name on PATH, if it differs from the tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_flags: Vec<String>,
}

/// A named, possibly nested, collection of tools and system packages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Filled from the table key on load
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Included bundles, expanded before this bundle's own lists
    #[serde(default)]
    pub bundles: Vec<String>,
    /// Generic system packages, used when no manager-specific list exists
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub system_packages: BTreeMap<String, Vec<String>>,
}

impl Bundle {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// System packages for `manager`, falling back to the generic list
    pub fn system_packages_for(&self, manager: &str) -> &[String] {
        self.system_packages
            .get(manager)
            .map(Vec::as_slice)
            .unwrap_or(&self.packages)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tools: BTreeMap<String, ToolSpec>,
    #[serde(default)]
    pub bundles: BTreeMap<String, Bundle>,
}

impl Catalog {
    /// Empty catalog; every bundle lookup misses
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut catalog: Catalog =
            toml::from_str(raw).map_err(|e| Error::CatalogParse(e.to_string()))?;
        for (name, bundle) in catalog.bundles.iter_mut() {
            bundle.name = name.clone();
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::CatalogParse(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_toml_str(&raw)?;
        debug!(
            "Loaded catalog from {}: {} tools, {} bundles",
            path.display(),
            catalog.tools.len(),
            catalog.bundles.len()
        );
        Ok(catalog)
    }

    /// Load `path` if it exists, otherwise return an empty catalog
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No catalog at {}, using an empty one", path.display());
            Ok(Self::new())
        }
    }

    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn bundle(&self, name: &str) -> Option<&Bundle> {
        self.bundles.get(name)
    }

    pub fn has_bundle(&self, name: &str) -> bool {
        self.bundles.contains_key(name)
    }

    /// Add or replace a bundle, keyed by its name
    pub fn insert_bundle(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.name.clone(), bundle);
    }

    /// Package-manager package name for a tool; the tool name when unknown
    pub fn package_name<'a>(&'a self, tool: &'a str) -> &'a str {
        self.tool(tool)
            .and_then(|spec| spec.package.as_deref())
            .unwrap_or(tool)
    }

    /// Binary name for a tool; the tool name when unknown
    pub fn binary_name<'a>(&'a self, tool: &'a str) -> &'a str {
        self.tool(tool)
            .and_then(|spec| spec.binary.as_deref())
            .unwrap_or(tool)
    }
}
