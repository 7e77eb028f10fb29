//! Project-wide reference harvesting.
//!
//! Walks the host's domain registries once per build and populates the
//! [`ReferenceMap`] with an entry for every spelling a cross-reference
//! to each object could take.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{LinkMode, ReadmeConfig};
use crate::ref_map::{ReferenceEntry, ReferenceMap, Role};
use crate::rst::get_all_xref_variants;

/// Python object types known to the API documentation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PyObjtype {
    Module,
    Class,
    Exception,
    Function,
    Method,
    Attribute,
    Property,
    Data,
}

impl PyObjtype {
    /// The roles a reference to this object type may be written with.
    fn roles(self) -> Vec<Role> {
        match self {
            PyObjtype::Module => vec![Role::Mod, Role::Obj],
            PyObjtype::Class => vec![Role::Class, Role::Obj],
            PyObjtype::Exception => vec![Role::Exc, Role::Class, Role::Obj],
            PyObjtype::Function => vec![Role::Func, Role::Obj],
            PyObjtype::Method => vec![Role::Meth, Role::Obj],
            PyObjtype::Attribute | PyObjtype::Property => vec![Role::Attr, Role::Obj],
            PyObjtype::Data => vec![Role::Data, Role::Obj],
        }
    }

    fn is_callable(self) -> bool {
        matches!(self, PyObjtype::Function | PyObjtype::Method)
    }

    /// Attributes, properties and data members have no meaningful source
    /// line range to link to.
    fn is_data_member(self) -> bool {
        matches!(self, PyObjtype::Attribute | PyObjtype::Property | PyObjtype::Data)
    }
}

/// One object from the host's Python domain registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyDomainObject {
    /// Module the object is defined in.
    pub module: String,
    /// Dotted name within the module; empty for the module itself.
    pub fullname: String,
    pub objtype: PyObjtype,
    /// Document the object is rendered on.
    pub docname: String,
    /// HTML anchor id on that document.
    pub anchor: String,
}

impl PyDomainObject {
    pub fn qualified_name(&self) -> String {
        if self.fullname.is_empty() {
            self.module.clone()
        } else {
            format!("{}.{}", self.module, self.fullname)
        }
    }
}

/// One object from the host's standard reference domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdDomainObject {
    /// `"doc"`, `"label"`, `"term"`, or a custom object type.
    pub objtype: String,
    /// The id this object is addressed by.
    pub name: String,
    pub docname: String,
    pub anchor: String,
    /// Display text: the document or section title.
    pub display: String,
}

/// Builds the reference map from the host's domain registries.
pub struct Harvester<'a> {
    config: &'a ReadmeConfig,
}

impl<'a> Harvester<'a> {
    pub fn new(config: &'a ReadmeConfig) -> Self {
        Self { config }
    }

    /// Harvests every object the API documentation domain knows about.
    pub fn harvest_python(&self, map: &mut ReferenceMap, objects: &[PyDomainObject]) {
        for object in objects {
            let qualified_name = object.qualified_name();

            let target = match self.python_target(object, &qualified_name) {
                Some(target) => target,
                // Unlinkable in this mode: leave no entry so unresolved
                // references degrade to inline literals
                None => continue,
            };

            self.insert_variants(
                map,
                &object.objtype.roles(),
                &qualified_name,
                &target,
                object.objtype.is_callable(),
            );
        }
        debug!("harvested {} python objects into {} entries", objects.len(), map.len());
    }

    fn python_target(&self, object: &PyDomainObject, qualified_name: &str) -> Option<String> {
        match self.config.mode {
            LinkMode::Code => {
                if object.objtype.is_data_member() {
                    return None;
                }
                if object.objtype == PyObjtype::Module {
                    return self
                        .config
                        .linkcode
                        .resolve_module(&self.config.blob_url, qualified_name);
                }
                self.config.linkcode.resolve(&object.module, &object.fullname)
            }
            LinkMode::Html => Some(format!(
                "{}/{}.html#{}",
                self.config.docs_url, object.docname, object.anchor
            )),
        }
    }

    /// Registers every spelling of `qualified_name` under each role.
    ///
    /// Tilde variants display only the last path segment; the remaining
    /// variants display the matched portion of the path.
    fn insert_variants(
        &self,
        map: &mut ReferenceMap,
        roles: &[Role],
        qualified_name: &str,
        target: &str,
        callable: bool,
    ) {
        let short_name = qualified_name.rsplit('.').next().unwrap_or(qualified_name);

        for variant in get_all_xref_variants(qualified_name) {
            let mut replace = if variant.starts_with('~') {
                short_name.to_string()
            } else {
                variant.trim_start_matches('.').to_string()
            };

            if callable {
                replace.push_str("()");
            }
            if self.config.inline_markup {
                replace = format!("``{}``", replace);
            }

            let entry = ReferenceEntry {
                replace,
                target: target.to_string(),
            };
            for role in roles {
                map.insert(role.clone(), &variant, entry.clone());
            }
        }
    }

    /// Harvests the standard domain: documents, labels, and custom
    /// object types.
    pub fn harvest_std(&self, map: &mut ReferenceMap, objects: &[StdDomainObject]) {
        // Doc targets are navigational pages; always link to HTML docs
        let html_base = self
            .config
            .html_baseurl
            .as_deref()
            .unwrap_or(&self.config.docs_url);

        for object in objects {
            // Titles come from the HTML pipeline and may carry entities
            let display = html_escape::decode_html_entities(&object.display).into_owned();
            let entry = ReferenceEntry {
                replace: display,
                target: if object.objtype == "doc" {
                    format!("{}/{}.html", html_base, object.docname)
                } else {
                    format!("{}/{}.html#{}", html_base, object.docname, object.anchor)
                },
            };

            match object.objtype.as_str() {
                "doc" => {
                    map.insert(Role::Doc, &object.docname, entry.clone());
                    // Absolute form, as written from the source root
                    map.insert(Role::Doc, &format!("/{}", object.docname), entry);
                }
                // Labels and terms are addressed through :ref:
                "label" | "term" => {
                    map.insert(Role::Ref, &normalize_label(&object.name), entry);
                }
                custom => {
                    map.insert(Role::Custom(custom.to_string()), &object.name, entry);
                }
            }
        }
    }
}

/// Label ids are matched case- and whitespace-insensitively.
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
