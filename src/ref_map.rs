//! The reference map: every spelling of a resolvable cross-reference
//! target, mapped to its replacement text and URL.
//!
//! Built once per project build by the harvester and read by the rewrite
//! engine; the map is an explicit value passed by reference, never global
//! state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The role family of a cross-reference.
///
/// Partitions the reference namespace: Python symbols, documents, labels,
/// and host-registered custom object types each resolve differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// `:class:` - Python class
    Class,
    /// `:exc:` - Python exception
    Exc,
    /// `:func:` - Python function
    Func,
    /// `:meth:` - Python method
    Meth,
    /// `:mod:` - Python module
    Mod,
    /// `:attr:` - Python attribute or property
    Attr,
    /// `:data:` - Python data member
    Data,
    /// `:obj:` - any Python object
    Obj,
    /// `:doc:` - a document
    Doc,
    /// `:ref:` - a section label (explicit or implicit)
    Ref,
    /// A custom object type registered by the host project, e.g. `:confval:`
    Custom(String),
}

impl Role {
    /// Parses a role name as written in source, tolerating a domain
    /// prefix (`:py:meth:` and `:meth:` are the same role).
    pub fn parse(name: &str) -> Role {
        let name = name
            .strip_prefix("py:")
            .or_else(|| name.strip_prefix("std:"))
            .unwrap_or(name);

        match name {
            "class" => Role::Class,
            "exc" => Role::Exc,
            "func" => Role::Func,
            "meth" => Role::Meth,
            "mod" => Role::Mod,
            "attr" => Role::Attr,
            "data" => Role::Data,
            "obj" => Role::Obj,
            "doc" => Role::Doc,
            "ref" => Role::Ref,
            other => Role::Custom(other.to_string()),
        }
    }

    /// Whether this role addresses a Python symbol.
    pub fn is_python(&self) -> bool {
        matches!(
            self,
            Role::Class
                | Role::Exc
                | Role::Func
                | Role::Meth
                | Role::Mod
                | Role::Attr
                | Role::Data
                | Role::Obj
        )
    }

    /// Whether targets of this role are callable (display text gets
    /// trailing parentheses).
    pub fn is_callable(&self) -> bool {
        matches!(self, Role::Func | Role::Meth)
    }

    /// The inventory object types a reference with this role may
    /// resolve through.
    pub fn objtypes(&self) -> Vec<String> {
        let types: &[&str] = match self {
            Role::Class => &["class", "exception"],
            Role::Exc => &["exception", "class"],
            Role::Func => &["function"],
            Role::Meth => &["method"],
            Role::Mod => &["module"],
            Role::Attr => &["attribute", "property"],
            Role::Data => &["data"],
            Role::Obj => &[
                "class", "exception", "function", "method", "module", "attribute", "property",
                "data",
            ],
            Role::Doc => &["doc"],
            Role::Ref => &["label", "term"],
            Role::Custom(name) => return vec![name.clone()],
        };
        types.iter().map(|t| t.to_string()).collect()
    }

    /// Whether inventory ids for this role are globally addressed by
    /// qualified name (Python objects) rather than namespaced by package.
    pub fn has_global_ids(&self) -> bool {
        self.is_python()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Class => write!(f, "class"),
            Role::Exc => write!(f, "exc"),
            Role::Func => write!(f, "func"),
            Role::Meth => write!(f, "meth"),
            Role::Mod => write!(f, "mod"),
            Role::Attr => write!(f, "attr"),
            Role::Data => write!(f, "data"),
            Role::Obj => write!(f, "obj"),
            Role::Doc => write!(f, "doc"),
            Role::Ref => write!(f, "ref"),
            Role::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Resolution data for one spelling of a cross-reference target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// The display text to substitute; may carry inline-literal markup.
    pub replace: String,
    /// Absolute URL the reference links to.
    pub target: String,
}

/// Lookup table from `(role, spelling)` to resolution data.
#[derive(Debug, Default)]
pub struct ReferenceMap {
    entries: IndexMap<(Role, String), ReferenceEntry>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry for one spelling. First writer wins: later
    /// harvester passes never overwrite an existing entry.
    pub fn insert(&mut self, role: Role, spelling: &str, entry: ReferenceEntry) {
        self.entries
            .entry((role, spelling.to_string()))
            .or_insert(entry);
    }

    /// Registers an entry under the composite key derived for an
    /// explicitly titled reference. Titled entries are keyed apart so
    /// differently titled references to the same target never collide.
    pub fn insert_titled(&mut self, role: Role, spelling: &str, title: &str, entry: ReferenceEntry) {
        let key = Self::titled_key(spelling, title);
        self.entries.insert((role, key), entry);
    }

    pub fn get(&self, role: &Role, spelling: &str) -> Option<&ReferenceEntry> {
        self.entries.get(&(role.clone(), spelling.to_string()))
    }

    pub fn get_titled(&self, role: &Role, spelling: &str, title: &str) -> Option<&ReferenceEntry> {
        self.get(role, &Self::titled_key(spelling, title))
    }

    /// Derived key for an explicitly titled reference.
    pub fn titled_key(spelling: &str, title: &str) -> String {
        format!("{}<{}>", spelling, title)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(Role, String), &ReferenceEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(replace: &str, target: &str) -> ReferenceEntry {
        ReferenceEntry {
            replace: replace.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("meth"), Role::Meth);
        assert_eq!(Role::parse("py:meth"), Role::Meth);
        assert_eq!(Role::parse("std:ref"), Role::Ref);
        assert_eq!(Role::parse("confval"), Role::Custom("confval".to_string()));
    }

    #[test]
    fn test_role_families() {
        assert!(Role::Meth.is_python());
        assert!(Role::Meth.is_callable());
        assert!(!Role::Class.is_callable());
        assert!(!Role::Doc.is_python());
        assert!(Role::Attr.has_global_ids());
        assert!(!Role::Ref.has_global_ids());
    }

    #[test]
    fn test_first_writer_wins() {
        let mut map = ReferenceMap::new();
        map.insert(Role::Meth, "Class.meth", entry("``meth()``", "https://a"));
        map.insert(Role::Meth, "Class.meth", entry("``other()``", "https://b"));

        let found = map.get(&Role::Meth, "Class.meth").unwrap();
        assert_eq!(found.target, "https://a");
    }

    #[test]
    fn test_titled_entries_are_keyed_apart() {
        let mut map = ReferenceMap::new();
        map.insert(Role::Ref, "label", entry("Section", "https://a"));
        map.insert_titled(Role::Ref, "label", "Custom Title", entry("Custom Title", "https://a"));

        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get_titled(&Role::Ref, "label", "Custom Title").unwrap().replace,
            "Custom Title"
        );
        assert_eq!(map.get(&Role::Ref, "label").unwrap().replace, "Section");
    }
}
