//! Source-code link resolution.
//!
//! Builds the template URL for linking to highlighted source code and the
//! resolver that formats final links from it. The resolver is injected
//! into the harvester so that no repository introspection happens there.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::host::RepoHost;

/// The location of an object's definition within the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path of the defining file, relative to the repository root.
    pub filepath: String,
    pub linestart: usize,
    pub linestop: usize,
}

/// Registry of source locations, keyed by fully qualified name.
///
/// Supplied by the host collaborator, which knows where every documented
/// object is defined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceIndex {
    objects: HashMap<String, SourceLocation>,
    /// Module name to defining file, for direct module links.
    modules: HashMap<String, String>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, qualified_name: &str, location: SourceLocation) {
        self.objects.insert(qualified_name.to_string(), location);
    }

    pub fn add_module(&mut self, module: &str, filepath: &str) {
        self.modules.insert(module.to_string(), filepath.to_string());
    }

    pub fn object(&self, qualified_name: &str) -> Option<&SourceLocation> {
        self.objects.get(qualified_name)
    }

    pub fn module_file(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }

    /// Loads an index from the JSON dump the host collaborator writes.
    pub fn from_json_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Generates the template URL for linking to highlighted source code.
///
/// The template carries `{filepath}`, `{linestart}` and `{linestop}`
/// placeholders that the resolver fills in per object.
pub fn get_linkcode_url(blob_url: &str, host: RepoHost) -> String {
    let blob_url = blob_url.trim_end_matches('/');
    match host {
        RepoHost::BitBucket => format!("{}/{{filepath}}#lines-{{linestart}}:{{linestop}}", blob_url),
        _ => format!("{}/{{filepath}}#L{{linestart}}-L{{linestop}}", blob_url),
    }
}

/// Custom resolver signature: `(module, fullname) -> url`.
pub type ResolveFn = Box<dyn Fn(&str, &str) -> Option<String>>;

/// Resolves fully qualified Python symbols to source-code URLs.
///
/// The default resolver looks the object up in a [`SourceIndex`] and
/// formats the template URL; a custom closure may replace it, mirroring
/// a user-supplied `linkcode_resolve()`.
pub struct LinkcodeResolver {
    linkcode_url: String,
    index: SourceIndex,
    custom: Option<ResolveFn>,
}

impl LinkcodeResolver {
    pub fn new(linkcode_url: String, index: SourceIndex) -> Self {
        Self {
            linkcode_url,
            index,
            custom: None,
        }
    }

    /// Replaces the default resolution logic with a custom function.
    pub fn with_custom(mut self, resolve: ResolveFn) -> Self {
        self.custom = Some(resolve);
        self
    }

    /// Returns the source URL for `module.fullname`, or `None` when no
    /// source location is recoverable.
    pub fn resolve(&self, module: &str, fullname: &str) -> Option<String> {
        if let Some(custom) = &self.custom {
            return custom(module, fullname);
        }

        let qualified_name = if fullname.is_empty() {
            module.to_string()
        } else {
            format!("{}.{}", module, fullname)
        };

        let location = self.index.object(&qualified_name)?;
        let link = self
            .linkcode_url
            .replace("{filepath}", &location.filepath)
            .replace("{linestart}", &location.linestart.to_string())
            .replace("{linestop}", &location.linestop.to_string());

        debug!("resolved source link for {}: {}", qualified_name, link);
        Some(link)
    }

    /// Returns the direct blob URL for a module's defining file.
    pub fn resolve_module(&self, blob_url: &str, module: &str) -> Option<String> {
        let filepath = self.index.module_file(module)?;
        Some(format!("{}/{}", blob_url.trim_end_matches('/'), filepath))
    }
}
