//! Configuration and context resolution.
//!
//! Resolves, once per build, every static fact the rest of the engine
//! treats as read-only: link mode, repository and blob URLs, the icon
//! map, the source file set, and raw source loading with `include`,
//! `only` and `raw` directive handling.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ReadmeError, Result};
use crate::git;
use crate::host::{self, HostContext, RepoHost};
use crate::linkcode::{get_linkcode_url, LinkcodeResolver, SourceIndex};
use crate::rst;

/// Where cross-reference links point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Links point at highlighted source code on the hosting platform.
    Code,
    /// Links point at rendered documentation pages.
    Html,
}

/// User-facing options, as the host build supplies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadmeOptions {
    /// Directory containing the RST sources.
    pub src_dir: PathBuf,
    /// Directory generated files are written to.
    pub out_dir: PathBuf,
    /// Source files to convert, optionally mapped to custom output names.
    pub src_files: IndexMap<String, Option<String>>,
    pub docs_url_type: LinkMode,
    /// Base URL of the rendered documentation.
    pub html_baseurl: Option<String>,
    /// Hosting platform identity fields.
    pub html_context: HostContext,
    /// Blob selector: `"head"`, `"last_tag"`, or a literal ref name.
    pub blob: String,
    /// Repository root; discovered through git when unset.
    pub repo_dir: Option<PathBuf>,
    pub inline_markup: bool,
    pub raw_directive: bool,
    pub replace_attrs: bool,
    /// Fail the build on unresolved references instead of downgrading
    /// them to inline literals.
    pub strict_resolution: bool,
    pub rubric_heading: Option<String>,
    pub admonition_icons: IndexMap<String, String>,
    pub default_admonition_icon: String,
    pub include_directive: bool,
    /// Tags for evaluating `only::` directives; `readme` is always set.
    pub tags: Vec<String>,
    pub rst_prolog: Option<String>,
    pub rst_epilog: Option<String>,
}

impl Default for ReadmeOptions {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("."),
            out_dir: PathBuf::from("."),
            src_files: IndexMap::new(),
            docs_url_type: LinkMode::Code,
            html_baseurl: None,
            html_context: HostContext::default(),
            blob: "head".to_string(),
            repo_dir: None,
            inline_markup: true,
            raw_directive: true,
            replace_attrs: true,
            strict_resolution: false,
            rubric_heading: None,
            admonition_icons: IndexMap::new(),
            default_admonition_icon: "📄".to_string(),
            include_directive: true,
            tags: Vec::new(),
            rst_prolog: None,
            rst_epilog: None,
        }
    }
}

/// Fully resolved build context. Read-only once constructed.
pub struct ReadmeConfig {
    pub mode: LinkMode,
    pub repo_url: String,
    pub repo_host: RepoHost,
    pub blob: String,
    /// Base URL for the resolved blob of the repository.
    pub blob_url: String,
    /// Base URL for resolving cross-references, per [`LinkMode`].
    pub docs_url: String,
    pub html_baseurl: Option<String>,
    /// Base URL for raw file content, used for image links.
    pub image_baseurl: String,
    pub repo_dir: PathBuf,
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Absolute source paths mapped to absolute output paths.
    pub src_files: IndexMap<PathBuf, PathBuf>,
    pub icon_map: IndexMap<String, String>,
    pub inline_markup: bool,
    pub raw_directive: bool,
    pub replace_attrs: bool,
    pub strict_resolution: bool,
    pub rubric_heading: Option<String>,
    pub include_directive: bool,
    pub tags: HashSet<String>,
    pub rst_prolog: Option<String>,
    pub rst_epilog: Option<String>,
    /// Injected resolver for Python symbol source links.
    pub linkcode: LinkcodeResolver,
}

const DEFAULT_ICONS: &[(&str, &str)] = &[
    ("attention", "🔔️"),
    ("caution", "⚠️"),
    ("danger", "☢️"),
    ("error", "⛔"),
    ("hint", "🧠"),
    ("important", "📢"),
    ("note", "📝"),
    ("tip", "💡"),
    ("warning", "🚩"),
];

impl ReadmeConfig {
    /// Resolves all static context from the user options and the host's
    /// source index.
    ///
    /// Missing repository identity, an invalid user/repo name, a missing
    /// required base URL, or unreachable git metadata are fatal.
    pub fn resolve(options: ReadmeOptions, index: SourceIndex) -> Result<ReadmeConfig> {
        let repo_url = options.html_context.repo_url()?;
        let repo_host = RepoHost::from_url(&repo_url).ok_or_else(|| {
            ReadmeError::config(format!("unsupported repository host: {}", repo_url))
        })?;

        let blob_selector = options
            .html_context
            .version()
            .unwrap_or(&options.blob)
            .to_string();
        let blob = git::get_blob(&blob_selector)?;
        let blob_url = host::blob_url(&repo_url, &blob);

        let html_baseurl = options
            .html_baseurl
            .as_ref()
            .map(|url| url.trim_end_matches('/').to_string());

        let docs_url = match options.docs_url_type {
            LinkMode::Html => html_baseurl.clone().ok_or_else(|| {
                ReadmeError::config("``html_baseurl`` must be set when ``docs_url_type`` is html")
            })?,
            LinkMode::Code => {
                // Non-source-code targets still need the HTML base URL
                if html_baseurl.is_none() {
                    return Err(ReadmeError::config(
                        "``html_baseurl`` must be set when ``docs_url_type`` is code",
                    ));
                }
                blob_url.clone()
            }
        };

        let image_baseurl = host::raw_content_url(&blob_url, repo_host);

        let repo_dir = match &options.repo_dir {
            Some(dir) => dir.clone(),
            None => git::get_repo_dir()?,
        };

        let mut icon_map: IndexMap<String, String> = DEFAULT_ICONS
            .iter()
            .map(|(class, icon)| (class.to_string(), icon.to_string()))
            .collect();
        icon_map.insert("default".to_string(), options.default_admonition_icon.clone());
        for (class, icon) in &options.admonition_icons {
            icon_map.insert(class.clone(), icon.clone());
        }

        let src_dir = options.src_dir.clone();
        let out_dir = if options.out_dir.is_absolute() {
            options.out_dir.clone()
        } else {
            src_dir.join(&options.out_dir)
        };

        let mut src_files = IndexMap::new();
        let mut missing = Vec::new();
        for (src, out) in &options.src_files {
            let src_path = src_dir.join(src);
            if !src_path.exists() {
                missing.push(src.clone());
                continue;
            }
            let out_name = match out {
                Some(name) => PathBuf::from(name),
                None => PathBuf::from(src_path.file_name().unwrap_or_default()),
            };
            src_files.insert(src_path, out_dir.join(out_name));
        }
        if !missing.is_empty() {
            return Err(ReadmeError::config(format!(
                "the following source files do not exist: {}",
                missing.join(", ")
            )));
        }

        let mut tags: HashSet<String> = options.tags.iter().cloned().collect();
        tags.insert("readme".to_string());

        let linkcode_url = get_linkcode_url(&blob_url, repo_host);
        let linkcode = LinkcodeResolver::new(linkcode_url, index);

        debug!("resolved docs url: {}", docs_url);

        Ok(ReadmeConfig {
            mode: options.docs_url_type,
            repo_url,
            repo_host,
            blob,
            blob_url,
            docs_url,
            html_baseurl,
            image_baseurl,
            repo_dir,
            src_dir,
            out_dir,
            src_files,
            icon_map,
            inline_markup: options.inline_markup,
            raw_directive: options.raw_directive,
            replace_attrs: options.replace_attrs,
            strict_resolution: options.strict_resolution,
            rubric_heading: options.rubric_heading,
            include_directive: options.include_directive,
            tags,
            rst_prolog: options.rst_prolog,
            rst_epilog: options.rst_epilog,
            linkcode,
        })
    }

    /// The icon for an admonition class, falling back to the default.
    pub fn icon_for(&self, class: &str) -> &str {
        self.icon_map
            .get(class)
            .or_else(|| self.icon_map.get("default"))
            .map(String::as_str)
            .unwrap_or("📄")
    }

    /// Reads and partially parses an RST source file.
    ///
    /// `only::` directives are evaluated against the tag set, `include::`
    /// directives are recursively expanded, and `raw::` directives are
    /// removed when raw output is disabled. Top-level files are wrapped
    /// with the configured prolog and epilog.
    pub fn read_rst(&self, rst_file: &Path) -> Result<String> {
        let rst = self.read_rst_inner(rst_file, true)?;
        let prolog = self.rst_prolog.as_deref().unwrap_or("");
        let epilog = self.rst_epilog.as_deref().unwrap_or("");

        if prolog.is_empty() && epilog.is_empty() {
            Ok(rst)
        } else {
            Ok(format!("{}\n{}\n{}", prolog, rst, epilog))
        }
    }

    fn read_rst_inner(&self, rst_file: &Path, replace_only: bool) -> Result<String> {
        let mut rst = std::fs::read_to_string(rst_file)?;

        if replace_only {
            rst = rst::replace_only_directives(&rst, &self.tags);
        }

        rst = self.expand_includes(&rst, rst_file, replace_only);

        if !self.raw_directive {
            rst = rst::remove_raw_directives(&rst);
        }

        Ok(rst)
    }

    /// Expands `include::` directives, honouring `:start-line:` and
    /// `:end-line:` slicing. Missing files drop the directive with a
    /// warning; the build continues.
    fn expand_includes(&self, rst: &str, rst_file: &Path, replace_only: bool) -> String {
        lazy_static! {
            static ref INCLUDE: Regex = Regex::new(
                r"(?m)^\.\. include::\s+(?P<file>\S+)[ \t]*\n(?P<args>(?:^[ ]+:\S+:.*\n?)*)"
            )
            .unwrap();
            static ref START_LINE: Regex = Regex::new(r":start-line:\s+(\d+)").unwrap();
            static ref END_LINE: Regex = Regex::new(r":end-line:\s+(\d+)").unwrap();
        }

        INCLUDE
            .replace_all(rst, |caps: &regex::Captures| {
                if !self.include_directive {
                    return String::new();
                }

                let file = &caps["file"];
                let args = &caps["args"];

                // Absolute paths are relative to the source dir, relative
                // paths to the including file's directory
                let path = if let Some(stripped) = file.strip_prefix('/') {
                    self.src_dir.join(stripped)
                } else {
                    rst_file.parent().unwrap_or(Path::new(".")).join(file)
                };

                let text = match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("included file {} does not exist", path.display());
                        return String::new();
                    }
                };

                let start = START_LINE
                    .captures(args)
                    .and_then(|c| c[1].parse::<usize>().ok())
                    .unwrap_or(0);
                let end = END_LINE
                    .captures(args)
                    .and_then(|c| c[1].parse::<usize>().ok());

                let lines: Vec<&str> = text.lines().collect();
                let end = end.unwrap_or(lines.len()).min(lines.len());
                let start = start.min(end);
                let mut sliced = lines[start..end].join("\n");

                if replace_only {
                    sliced = rst::replace_only_directives(&sliced, &self.tags);
                }
                sliced = self.expand_includes(&sliced, &path, replace_only);
                if !self.raw_directive {
                    sliced = rst::remove_raw_directives(&sliced);
                }

                sliced
            })
            .into_owned()
    }
}
