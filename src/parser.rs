//! Per-document structural extraction.
//!
//! Walks the resolved document tree for each file being converted and
//! records the structural facts the rewrite engine cannot recover from
//! raw text alone: admonition boundaries and classes, toctree entries,
//! and rubric contents.

use log::debug;
use std::collections::HashMap;

use crate::config::ReadmeConfig;
use crate::doctree::{AdmonitionNode, Doctree, ToctreeNode};
use crate::rst::replace_only_directives;

/// An admonition found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmonitionRecord {
    /// Semantic class: `note`, `warning`, or a user-defined class.
    pub class: String,
    pub title: String,
    /// Body text, exactly as it appears in source.
    pub body: String,
    /// Declared via the generic `admonition::` directive with an explicit
    /// title, rather than a dedicated per-class directive.
    pub generic: bool,
}

/// One entry of a table of contents: a document link or a nested tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocEntry {
    Link { title: String, target: String },
    SubTree(ToctreeRecord),
}

/// A toctree directive, resolved to titles and bounded by depth.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToctreeRecord {
    pub caption: Option<String>,
    pub entries: Vec<TocEntry>,
}

/// A rubric found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricRecord {
    pub text: String,
}

/// Structural facts extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentRecords {
    pub admonitions: Vec<AdmonitionRecord>,
    pub toctrees: Vec<ToctreeRecord>,
    pub rubrics: Vec<RubricRecord>,
}

/// Callback for re-deriving a corrected tree from adjusted source text,
/// used when conditional inclusion changes the effective source.
pub type ReparseFn<'a> = &'a dyn Fn(&str, &str) -> Doctree;

/// Extracts structural records from resolved document trees.
pub struct DocumentParser<'a> {
    config: &'a ReadmeConfig,
    /// Document titles, for resolving toctree entries without an
    /// explicit title.
    titles: &'a HashMap<String, String>,
}

impl<'a> DocumentParser<'a> {
    pub fn new(config: &'a ReadmeConfig, titles: &'a HashMap<String, String>) -> Self {
        Self { config, titles }
    }

    /// Extracts records from a tree, re-parsing first when `only::`
    /// evaluation for this output target changes the effective source.
    ///
    /// The host's tree was built for the primary HTML target; if the
    /// readme tag set selects different content, structural facts must
    /// come from a corrected tree or they will describe the wrong text.
    pub fn parse(&self, tree: &Doctree, reparse: ReparseFn) -> DocumentRecords {
        let adjusted = replace_only_directives(&tree.source, &self.config.tags);

        if adjusted != tree.source {
            // Temporary docname avoids duplicate-target warnings in the host
            let temp_docname = format!("{}-readme", tree.docname);
            debug!("re-parsing {} with readme conditionals applied", tree.docname);
            let corrected = reparse(&temp_docname, &adjusted);
            return self.extract(&corrected);
        }

        self.extract(tree)
    }

    fn extract(&self, tree: &Doctree) -> DocumentRecords {
        let mut records = DocumentRecords::default();

        for node in tree.admonitions() {
            records.admonitions.push(self.admonition_record(node));
        }
        for node in tree.toctrees() {
            records.toctrees.push(self.toctree_record(node, node.maxdepth, 1));
        }
        for node in tree.rubrics() {
            records.rubrics.push(RubricRecord {
                text: node.text.clone(),
            });
        }

        debug!(
            "{}: {} admonitions, {} toctrees, {} rubrics",
            tree.docname,
            records.admonitions.len(),
            records.toctrees.len(),
            records.rubrics.len()
        );
        records
    }

    /// Distinguishes generic admonitions (explicit class and title) from
    /// specific ones, whose implicit title is the capitalized class name.
    fn admonition_record(&self, node: &AdmonitionNode) -> AdmonitionRecord {
        let class = node
            .classes
            .first()
            .cloned()
            .unwrap_or_else(|| "note".to_string());

        match &node.title {
            Some(title) => AdmonitionRecord {
                class,
                title: title.clone(),
                body: node.body.clone(),
                generic: true,
            },
            None => {
                let mut title = class.clone();
                if let Some(first) = title.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                AdmonitionRecord {
                    class,
                    title,
                    body: node.body.clone(),
                    generic: false,
                }
            }
        }
    }

    fn toctree_record(
        &self,
        node: &ToctreeNode,
        maxdepth: Option<usize>,
        depth: usize,
    ) -> ToctreeRecord {
        let mut record = ToctreeRecord {
            caption: node.caption.clone(),
            entries: Vec::new(),
        };

        for entry in &node.entries {
            let title = entry
                .title
                .clone()
                .or_else(|| self.titles.get(&entry.target).cloned())
                .unwrap_or_else(|| entry.target.clone());

            record.entries.push(TocEntry::Link {
                title,
                target: entry.target.clone(),
            });

            // titles-only cuts the tree off below the top level
            if node.titles_only && depth >= 1 {
                continue;
            }
            if let Some(max) = maxdepth {
                if depth >= max {
                    continue;
                }
            }
            if let Some(subtree) = &entry.subtree {
                record
                    .entries
                    .push(TocEntry::SubTree(self.toctree_record(subtree, maxdepth, depth + 1)));
            }
        }

        record
    }
}
