//! readme-rst
//!
//! Rewrites documentation-generator-flavoured reStructuredText into portable
//! RST that renders on GitHub, GitLab, BitBucket and PyPI: cross-reference
//! roles become hyperlinks or substitutions, toctrees become link lists,
//! admonitions become tables, and image paths point at raw repository content.

pub mod builder;
pub mod config;
pub mod doctree;
pub mod error;
pub mod git;
pub mod harvest;
pub mod host;
pub mod inventory;
pub mod linkcode;
pub mod parser;
pub mod ref_map;
pub mod rst;
pub mod transform;

pub use builder::ReadmeBuilder;
pub use config::{LinkMode, ReadmeConfig, ReadmeOptions};
pub use doctree::{AdmonitionNode, DocNode, Doctree, RubricNode, ToctreeEntryNode, ToctreeNode};
pub use error::{ReadmeError, Result};
pub use harvest::{Harvester, PyDomainObject, PyObjtype, StdDomainObject};
pub use host::{HostContext, HostIdentity, RepoHost};
pub use inventory::{ExternalRef, Inventory, InventoryItem};
pub use linkcode::{LinkcodeResolver, SourceIndex, SourceLocation};
pub use parser::{
    AdmonitionRecord, DocumentParser, DocumentRecords, ReparseFn, RubricRecord, TocEntry,
    ToctreeRecord,
};
pub use ref_map::{ReferenceEntry, ReferenceMap, Role};
pub use transform::{format_hyperlink, RewriteEngine, Substitution};
