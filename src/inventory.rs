//! External (cross-project) reference inventory.
//!
//! A pre-built mapping from other documentation projects' objects to
//! their published URLs, consulted when a reference cannot be resolved
//! locally or is explicitly scoped to an external package.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ref_map::Role;

/// One object in the external inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub package: String,
    pub version: String,
    pub uri: String,
    pub label: String,
}

/// The result of an inventory lookup.
#[derive(Debug, Clone)]
pub struct ExternalRef {
    pub objtype: String,
    pub package: String,
    pub version: String,
    /// Absolute URL of the published object.
    pub target: String,
    pub label: String,
    /// Map id: namespaced by package, except Python objects whose
    /// qualified names are globally unique already.
    pub id: String,
}

/// Inventory of external objects: `objtype -> target-id -> item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    objects: IndexMap<String, IndexMap<String, InventoryItem>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, objtype: &str, id: &str, item: InventoryItem) {
        self.objects
            .entry(objtype.to_string())
            .or_default()
            .insert(id.to_string(), item);
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Loads an inventory from the JSON dump the host collaborator writes.
    pub fn from_json_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Whether `name` is a package present in the inventory.
    pub fn has_package(&self, name: &str) -> bool {
        self.objects
            .values()
            .flat_map(|ids| ids.values())
            .any(|item| item.package == name)
    }

    /// Resolves a reference through the inventory.
    ///
    /// An `external+pkg:target` prefix or a `pkg:target` scoping colon
    /// forces a named-package lookup; otherwise every objtype the role
    /// could mean is searched across all packages.
    pub fn resolve(&self, role: &Role, target: &str) -> Option<ExternalRef> {
        let (package, target) = self.parse_scope(target);

        for objtype in role.objtypes() {
            let ids = match self.objects.get(&objtype) {
                Some(ids) => ids,
                None => continue,
            };
            let item = match ids.get(target) {
                Some(item) => item,
                None => continue,
            };
            if let Some(package) = package {
                if item.package != package {
                    continue;
                }
            }
            return Some(self.external_ref(role, &objtype, target, item));
        }

        None
    }

    /// Splits an explicit package scope off the target, if present.
    fn parse_scope<'a>(&self, target: &'a str) -> (Option<&'a str>, &'a str) {
        let target = target.strip_prefix("external+").unwrap_or(target);

        if let Some((package, rest)) = target.split_once(':') {
            if self.has_package(package) {
                return (Some(package), rest);
            }
        }

        (None, target)
    }

    /// Whether the reference syntax explicitly names an external package.
    pub fn is_explicit_external(&self, target: &str) -> bool {
        if target.starts_with("external+") {
            return true;
        }
        match target.split_once(':') {
            Some((package, _)) => self.has_package(package),
            None => false,
        }
    }

    fn external_ref(&self, role: &Role, objtype: &str, target: &str, item: &InventoryItem) -> ExternalRef {
        let id = if role.has_global_ids() {
            target.to_string()
        } else {
            format!("{}:{}", item.package, target)
        };
        ExternalRef {
            objtype: objtype.to_string(),
            package: item.package.clone(),
            version: item.version.clone(),
            target: item.uri.clone(),
            label: item.label.clone(),
            id,
        }
    }
}
