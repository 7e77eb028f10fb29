//! Input model for resolved document trees.
//!
//! The host documentation pipeline parses and resolves each page; this
//! module defines the minimal node model it hands over for structural
//! extraction. It is an external interface, not an RST parser.

use serde::{Deserialize, Serialize};

/// An admonition node: a call-out block with a class, title and body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmonitionNode {
    /// Semantic classes; the first entry is the admonition class.
    pub classes: Vec<String>,
    /// Explicit title argument, for generic admonitions.
    pub title: Option<String>,
    /// Raw body text, exactly as it appears in source. The rewrite stage
    /// reconstructs its match pattern from this text.
    pub body: String,
}

/// One entry of a toctree: a document link, optionally carrying an
/// explicit title and a nested sub-tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToctreeEntryNode {
    /// Explicit title (`Title <target>` syntax), if given.
    pub title: Option<String>,
    /// Target document name, relative to the source root.
    pub target: String,
    pub subtree: Option<ToctreeNode>,
}

/// A toctree directive instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToctreeNode {
    pub caption: Option<String>,
    pub maxdepth: Option<usize>,
    pub titles_only: bool,
    pub entries: Vec<ToctreeEntryNode>,
}

/// A rubric directive: an informal heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricNode {
    pub text: String,
}

/// One node of a resolved document tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocNode {
    Admonition(AdmonitionNode),
    Toctree(ToctreeNode),
    Rubric(RubricNode),
}

/// A resolved document, as produced by the host pipeline after
/// cross-reference resolution and transforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctree {
    /// Document name relative to the source root, without extension.
    pub docname: String,
    /// The raw source text this tree was derived from.
    pub source: String,
    pub nodes: Vec<DocNode>,
}

impl Doctree {
    pub fn new(docname: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            docname: docname.into(),
            source: source.into(),
            nodes: Vec::new(),
        }
    }

    pub fn admonitions(&self) -> impl Iterator<Item = &AdmonitionNode> {
        self.nodes.iter().filter_map(|node| match node {
            DocNode::Admonition(adm) => Some(adm),
            _ => None,
        })
    }

    pub fn toctrees(&self) -> impl Iterator<Item = &ToctreeNode> {
        self.nodes.iter().filter_map(|node| match node {
            DocNode::Toctree(toc) => Some(toc),
            _ => None,
        })
    }

    pub fn rubrics(&self) -> impl Iterator<Item = &RubricNode> {
        self.nodes.iter().filter_map(|node| match node {
            DocNode::Rubric(rubric) => Some(rubric),
            _ => None,
        })
    }
}
