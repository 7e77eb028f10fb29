//! The rewrite engine.
//!
//! Pure-text transformation over one document at a time: each stage
//! consumes the previous stage's output and every stage is idempotent
//! on already-converted text. Structural stages (admonitions, toctrees,
//! rubrics) pair the parser's records with pattern matches in the raw
//! text; the cross-reference stage works from the reference map and the
//! external inventory alone.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, NoExpand, Regex};
use std::path::{Component, Path, PathBuf};

use crate::config::ReadmeConfig;
use crate::error::{ReadmeError, Result};
use crate::harvest::normalize_label;
use crate::inventory::{ExternalRef, Inventory};
use crate::parser::{AdmonitionRecord, DocumentRecords, RubricRecord, TocEntry, ToctreeRecord};
use crate::ref_map::{ReferenceMap, Role};
use crate::rst::{self, valid_after, valid_before, InlineFormat, SECTION_CHARS};

/// A substitution definition pair emitted when a hyperlink's display
/// text carries nested inline markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub label: String,
    pub replace: String,
    pub target: String,
}

/// Formats a hyperlink to `target` with the given display text.
///
/// Plain text yields a direct inline hyperlink and no definition lines.
/// Text with nested inline markup cannot legally appear inside a
/// hyperlink, so it goes through substitution indirection: the result is
/// a `|label|_` reference plus a `replace::` line and a target line.
pub fn format_hyperlink(label: &str, target: &str, text: &str) -> (String, Vec<String>) {
    if has_nested_markup(text) {
        let lines = vec![
            format!(".. |{}| replace:: {}", label, text),
            format!(".. _{}: {}", label, target),
        ];
        (format!("|{}|_", label), lines)
    } else {
        (format!("`{} <{}>`_", text, target), Vec::new())
    }
}

fn has_nested_markup(text: &str) -> bool {
    text.contains('`') || text.contains('*') || text.contains('|')
}

/// Assembles the substitution header for a document: definitions are
/// deduplicated by label and sorted case-insensitively, ignoring leading
/// markup characters, so output is deterministic across builds.
pub fn assemble_header(subs: &[Substitution]) -> String {
    let mut unique: indexmap::IndexMap<&str, &Substitution> = indexmap::IndexMap::new();
    for sub in subs {
        unique.entry(sub.label.as_str()).or_insert(sub);
    }

    let mut ordered: Vec<&Substitution> = unique.into_values().collect();
    ordered.sort_by_key(|sub| header_sort_key(&sub.label));

    let mut lines = Vec::with_capacity(ordered.len() * 2);
    for sub in ordered {
        lines.push(format!(".. |{}| replace:: {}", sub.label, sub.replace));
        lines.push(format!(".. _{}: {}", sub.label, sub.target));
    }
    lines.join("\n")
}

fn header_sort_key(label: &str) -> String {
    label
        .trim_start_matches(|c: char| "`~.*|_".contains(c))
        .to_lowercase()
}

fn prev_char(text: &str, idx: usize) -> Option<char> {
    text[..idx].chars().next_back()
}

fn next_char(text: &str, idx: usize) -> Option<char> {
    text[idx..].chars().next()
}

/// Splits an explicitly titled reference body (`Title <target>`) into
/// its title and target.
fn split_title(body: &str) -> (Option<&str>, &str) {
    if let Some(stripped) = body.strip_suffix('>') {
        if let Some(idx) = stripped.rfind('<') {
            let title = body[..idx].trim();
            let target = stripped[idx + 1..].trim();
            if !title.is_empty() && !target.is_empty() {
                return (Some(title), target);
            }
        }
    }
    (None, body.trim())
}

/// Replacement text for a reference that cannot be linked: the display
/// name as an inline literal, never broken role syntax.
fn downgrade_literal(role: &Role, target: &str, title: Option<&str>) -> String {
    if let Some(title) = title {
        return format!("``{}``", title);
    }
    let stripped = target.trim_start_matches('~');
    let name = if target.starts_with('~') {
        stripped.rsplit('.').next().unwrap_or(stripped)
    } else {
        target.trim_start_matches('.')
    };
    let mut name = name.to_string();
    if role.is_callable() {
        name.push_str("()");
    }
    format!("``{}``", name)
}

/// Lexically normalizes a path, resolving `.` and `..` components.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Rewrites one document's text into portable RST.
pub struct RewriteEngine<'a> {
    config: &'a ReadmeConfig,
    ref_map: &'a ReferenceMap,
    inventory: &'a Inventory,
}

impl<'a> RewriteEngine<'a> {
    pub fn new(
        config: &'a ReadmeConfig,
        ref_map: &'a ReferenceMap,
        inventory: &'a Inventory,
    ) -> Self {
        Self {
            config,
            ref_map,
            inventory,
        }
    }

    /// Runs the full rewrite pipeline over one document and prepends the
    /// assembled substitution header.
    pub fn rewrite(
        &self,
        docname: &str,
        src_path: &Path,
        rst: &str,
        records: &DocumentRecords,
    ) -> Result<String> {
        let mut subs = Vec::new();

        let mut text = self.replace_admonitions(rst, &records.admonitions);
        text = self.replace_images(&text, src_path);
        text = self.replace_toctrees(&text, &records.toctrees);
        text = self.replace_rubrics(&text, &records.rubrics);
        text = self.replace_cross_refs(&text, docname, &mut subs)?;
        if self.config.replace_attrs {
            text = self.replace_attrs(&text);
        }

        let header = assemble_header(&subs);
        if header.is_empty() {
            Ok(text)
        } else {
            Ok(format!("{}\n\n{}", header, text))
        }
    }

    /// Replaces admonition directives with a raw-HTML table or a
    /// `list-table::` directive, per the raw-directive toggle.
    ///
    /// The match pattern is reconstructed from the record's body text.
    /// If the live text has diverged from the recorded body, the pattern
    /// fails to match and the admonition is left unconverted.
    pub fn replace_admonitions(&self, rst: &str, records: &[AdmonitionRecord]) -> String {
        let mut text = rst.to_string();

        for record in records {
            let pattern = self.admonition_pattern(record);
            let re = match Regex::new(&pattern) {
                Ok(re) => re,
                Err(err) => {
                    warn!("could not build admonition pattern for {:?}: {}", record.title, err);
                    continue;
                }
            };
            if !re.is_match(&text) {
                debug!("admonition {:?} not found in source text; skipping", record.title);
                continue;
            }

            let replacement = self.render_admonition(record);
            text = re.replace(&text, NoExpand(&replacement)).into_owned();
        }

        text
    }

    fn admonition_pattern(&self, record: &AdmonitionRecord) -> String {
        let mut pattern = String::from(r"(?m)^[ ]*\.\. ");

        if record.generic {
            pattern.push_str(&format!(
                r"admonition::[ \t]*{}[ \t]*$\n?",
                regex::escape(&record.title)
            ));
            pattern.push_str(&format!(
                r"(?:^[ ]+:class:[ \t]*{}[ \t]*$\n?)?",
                regex::escape(&record.class)
            ));
        } else {
            pattern.push_str(&format!(r"{}::[ \t]*$\n?", regex::escape(&record.class)));
        }

        pattern.push_str(r"(?:^[ \t]*$\n?)*");
        for line in record.body.lines() {
            if line.trim().is_empty() {
                pattern.push_str(r"^[ \t]*$\n?");
            } else {
                pattern.push_str(&format!(r"^[ ]+{}[ \t]*$\n?", regex::escape(line)));
            }
        }

        pattern
    }

    fn render_admonition(&self, record: &AdmonitionRecord) -> String {
        let icon = self.config.icon_for(&record.class);

        if self.config.raw_directive {
            format!(
                "\n.. raw:: html\n\n   <table>\n       <tr align=\"left\">\n           <th>\n\n\
                 {icon} {title}\n\n\
                 .. raw:: html\n\n   </th>\n   <tr><td>\n\n\
                 {body}\n\n\
                 .. raw:: html\n\n   </td></tr>\n   </table>\n",
                icon = icon,
                title = record.title,
                body = record.body,
            )
        } else {
            let mut lines = record.body.lines();
            let first = lines.next().unwrap_or("");
            let mut body = format!("   * - {}", first);
            for line in lines {
                body.push('\n');
                if !line.trim().is_empty() {
                    body.push_str("     ");
                    body.push_str(line);
                }
            }
            format!(
                ".. list-table::\n   :header-rows: 1\n\n   * - {icon} {title}\n{body}\n",
                icon = icon,
                title = record.title,
                body = body,
            )
        }
    }

    /// Rewrites `image::` and `figure::` paths to raw-content URLs on
    /// the hosting platform. Applies in both link modes, since the
    /// platform serves these standalone either way.
    pub fn replace_images(&self, rst: &str, src_path: &Path) -> String {
        lazy_static! {
            static ref IMAGE: Regex =
                Regex::new(r"(?m)^(?P<head>[ ]*\.\. (?:image|figure)::\s+)(?P<path>\S+)").unwrap();
        }

        IMAGE
            .replace_all(rst, |caps: &Captures| {
                let head = &caps["head"];
                let path = &caps["path"];

                if path.starts_with("http://") || path.starts_with("https://") {
                    return caps[0].to_string();
                }

                // Absolute paths are relative to the source dir, relative
                // paths to the document's directory
                let abs = if let Some(stripped) = path.strip_prefix('/') {
                    self.config.src_dir.join(stripped)
                } else {
                    src_path.parent().unwrap_or(Path::new(".")).join(path)
                };
                let abs = normalize_path(&abs);

                match pathdiff::diff_paths(&abs, &self.config.repo_dir) {
                    Some(rel) if !rel.starts_with("..") => {
                        format!("{}{}/{}", head, self.config.image_baseurl, rel.display())
                    }
                    _ => {
                        warn!("image {} is outside the repository; leaving as-is", path);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Replaces toctree directives with indented bullet lists of links.
    ///
    /// Toctree targets are navigational pages, so links always point at
    /// the rendered HTML docs regardless of the active link mode.
    pub fn replace_toctrees(&self, rst: &str, records: &[ToctreeRecord]) -> String {
        lazy_static! {
            static ref TOCTREE: Regex =
                Regex::new(r"(?m)^[ ]*\.\. toctree::[ ]*\n(?:^[ ]+.*$\n?|^[ \t]*$\n?)*").unwrap();
        }

        let mut remaining = records.iter();
        TOCTREE
            .replace_all(rst, |caps: &Captures| match remaining.next() {
                Some(record) => format!("{}\n", self.render_toctree(record)),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn render_toctree(&self, record: &ToctreeRecord) -> String {
        let mut out = String::new();
        if let Some(caption) = &record.caption {
            out.push_str(&rst::format_rst(InlineFormat::Bold, caption));
            out.push_str("\n\n");
        }
        self.render_toc_entries(&record.entries, 0, &mut out);
        out
    }

    fn render_toc_entries(&self, entries: &[TocEntry], depth: usize, out: &mut String) {
        for entry in entries {
            match entry {
                TocEntry::Link { title, target } => {
                    out.push_str(&format!(
                        "{}* `{} <{}/{}.html>`_\n",
                        "  ".repeat(depth),
                        title,
                        self.html_base(),
                        target
                    ));
                }
                TocEntry::SubTree(subtree) => {
                    self.render_toc_entries(&subtree.entries, depth + 1, out);
                }
            }
        }
    }

    fn html_base(&self) -> &str {
        self.config
            .html_baseurl
            .as_deref()
            .unwrap_or(&self.config.docs_url)
    }

    /// Replaces rubric directives with a synthetic section heading when a
    /// valid adornment character is configured, or bold text otherwise.
    pub fn replace_rubrics(&self, rst: &str, records: &[RubricRecord]) -> String {
        lazy_static! {
            static ref RUBRIC: Regex =
                Regex::new(r"(?m)^[ ]*\.\. rubric::\s+(?P<text>.+?)[ \t]*$\n?").unwrap();
        }

        let heading_char = self.heading_char();
        let mut remaining = records.iter();

        RUBRIC
            .replace_all(rst, |caps: &Captures| {
                let text = remaining
                    .next()
                    .map(|record| record.text.as_str())
                    .unwrap_or_else(|| caps["text"].trim());

                match heading_char {
                    Some(c) => {
                        let underline: String = std::iter::repeat(c).take(text.chars().count()).collect();
                        format!("{}\n{}\n", text, underline)
                    }
                    None => format!("{}\n", rst::format_rst(InlineFormat::Bold, text)),
                }
            })
            .into_owned()
    }

    fn heading_char(&self) -> Option<char> {
        let heading = self.config.rubric_heading.as_deref()?;
        let mut chars = heading.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if SECTION_CHARS.contains(c) => Some(c),
            _ => None,
        }
    }

    /// Replaces cross-reference roles with hyperlinks.
    ///
    /// Both syntactic shapes are handled: ``:role:`target``` and
    /// ``:role:`Title <target>```. Candidates failing the inline-markup
    /// adjacency rules are left untouched, so role syntax inside inline
    /// literals never fires.
    pub fn replace_cross_refs(
        &self,
        rst: &str,
        docname: &str,
        subs: &mut Vec<Substitution>,
    ) -> Result<String> {
        lazy_static! {
            static ref XREF: Regex = Regex::new(
                r":(?P<role>[A-Za-z][\w+.-]*(?::[A-Za-z][\w+.-]*)?):`(?P<body>[^`\n]+)`"
            )
            .unwrap();
        }

        let mut out = String::with_capacity(rst.len());
        let mut last = 0;

        for caps in XREF.captures_iter(rst) {
            let m = caps.get(0).expect("whole-match group");
            if !valid_before(prev_char(rst, m.start())) || !valid_after(next_char(rst, m.end())) {
                continue;
            }

            if let Some(replacement) =
                self.resolve_reference(&caps["role"], &caps["body"], docname, subs)?
            {
                out.push_str(&rst[last..m.start()]);
                out.push_str(&replacement);
                last = m.end();
            }
        }

        out.push_str(&rst[last..]);
        Ok(out)
    }

    /// Resolves one reference and formats its replacement text.
    ///
    /// Returns `Ok(None)` to leave the reference untouched for a later
    /// stage. Explicitly external references skip the local map entirely;
    /// everything else is looked up locally first with the inventory as
    /// fallback.
    fn resolve_reference(
        &self,
        role_name: &str,
        body: &str,
        docname: &str,
        subs: &mut Vec<Substitution>,
    ) -> Result<Option<String>> {
        let role = Role::parse(role_name);
        let (title, target) = split_title(body);

        if self.inventory.is_explicit_external(target) {
            return match self.inventory.resolve(&role, target) {
                Some(ext) => Ok(Some(self.external_hyperlink(&role, title, &ext, subs))),
                None => self.unresolved(&role, target, title),
            };
        }

        let spelling = match &role {
            Role::Ref => normalize_label(target),
            Role::Doc => self.resolve_doc_spelling(docname, target),
            _ => target.to_string(),
        };

        let entry = match title {
            Some(title) => self
                .ref_map
                .get_titled(&role, &spelling, title)
                .or_else(|| self.ref_map.get(&role, &spelling)),
            None => self.ref_map.get(&role, &spelling),
        };
        // A relative doc path that resolved to nothing may have been
        // written root-relative without the leading slash
        let entry = entry.or_else(|| {
            if role == Role::Doc && spelling != target {
                self.ref_map.get(&role, target)
            } else {
                None
            }
        });

        if let Some(entry) = entry {
            let label = match title {
                Some(title) => ReferenceMap::titled_key(&spelling, title),
                None => spelling.clone(),
            };
            let text = title.unwrap_or(&entry.replace);
            return Ok(Some(self.hyperlink(&label, &entry.target, text, subs)));
        }

        if let Some(ext) = self.inventory.resolve(&role, target) {
            return Ok(Some(self.external_hyperlink(&role, title, &ext, subs)));
        }

        self.unresolved(&role, target, title)
    }

    fn unresolved(&self, role: &Role, target: &str, title: Option<&str>) -> Result<Option<String>> {
        if *role == Role::Attr && self.config.replace_attrs {
            // Deferred to the attribute stage
            return Ok(None);
        }
        if self.config.strict_resolution {
            return Err(ReadmeError::UnresolvedReference {
                role: role.to_string(),
                target: target.to_string(),
            });
        }
        debug!("downgrading unresolved :{}:`{}` to an inline literal", role, target);
        Ok(Some(downgrade_literal(role, target, title)))
    }

    fn external_hyperlink(
        &self,
        role: &Role,
        title: Option<&str>,
        ext: &ExternalRef,
        subs: &mut Vec<Substitution>,
    ) -> String {
        let text = match title {
            Some(title) => title.to_string(),
            None => {
                let mut text = ext.label.clone();
                if role.is_callable() {
                    text.push_str("()");
                }
                if role.is_python() && self.config.inline_markup {
                    text = format!("``{}``", text);
                }
                text
            }
        };
        let label = match title {
            Some(title) => ReferenceMap::titled_key(&ext.id, title),
            None => ext.id.clone(),
        };
        self.hyperlink(&label, &ext.target, &text, subs)
    }

    /// Resolves a `:doc:` target to its map spelling. Absolute targets
    /// are kept as written; relative targets are resolved against the
    /// referencing document's directory.
    fn resolve_doc_spelling(&self, docname: &str, target: &str) -> String {
        if target.starts_with('/') {
            return target.to_string();
        }

        let mut parts: Vec<&str> = docname.split('/').collect();
        parts.pop();
        for segment in target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        parts.join("/")
    }

    fn hyperlink(
        &self,
        label: &str,
        target: &str,
        text: &str,
        subs: &mut Vec<Substitution>,
    ) -> String {
        let (inline, lines) = format_hyperlink(label, target, text);
        if !lines.is_empty() {
            subs.push(Substitution {
                label: label.to_string(),
                replace: text.to_string(),
                target: target.to_string(),
            });
        }
        inline
    }

    /// Downgrades remaining `:attr:` references to inline literals.
    ///
    /// Runs after cross-reference resolution, so it only sees attribute
    /// references with no map entry (unlinkable in the active mode).
    pub fn replace_attrs(&self, rst: &str) -> String {
        lazy_static! {
            static ref ATTR: Regex = Regex::new(r":attr:`(?P<body>[^`\n]+)`").unwrap();
        }

        let mut out = String::with_capacity(rst.len());
        let mut last = 0;

        for caps in ATTR.captures_iter(rst) {
            let m = caps.get(0).expect("whole-match group");
            if !valid_before(prev_char(rst, m.start())) || !valid_after(next_char(rst, m.end())) {
                continue;
            }
            let (title, target) = split_title(&caps["body"]);
            out.push_str(&rst[last..m.start()]);
            out.push_str(&downgrade_literal(&Role::Attr, target, title));
            last = m.end();
        }

        out.push_str(&rst[last..]);
        out
    }
}
