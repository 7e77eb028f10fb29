//! Build orchestration.
//!
//! `ReadmeBuilder` ties the engine together over the lifetime of one
//! host build: sources are loaded when the environment is ready, the
//! reference map fills as document trees resolve, and the rewrite
//! pipeline runs once the build finishes.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ReadmeConfig, ReadmeOptions};
use crate::doctree::Doctree;
use crate::harvest::{Harvester, PyDomainObject, StdDomainObject};
use crate::inventory::Inventory;
use crate::linkcode::SourceIndex;
use crate::parser::{DocumentParser, DocumentRecords, ReparseFn};
use crate::ref_map::ReferenceMap;
use crate::transform::RewriteEngine;

pub struct ReadmeBuilder {
    config: ReadmeConfig,
    ref_map: ReferenceMap,
    inventory: Inventory,
    /// Pre-processed raw text per source file.
    sources: IndexMap<PathBuf, String>,
    /// Structural records per convertible document.
    records: HashMap<String, DocumentRecords>,
    /// Document titles, for toctree entries without explicit titles.
    titles: HashMap<String, String>,
}

impl ReadmeBuilder {
    pub fn new(options: ReadmeOptions, index: SourceIndex) -> Result<Self> {
        let config = ReadmeConfig::resolve(options, index)?;
        Ok(Self {
            config,
            ref_map: ReferenceMap::new(),
            inventory: Inventory::new(),
            sources: IndexMap::new(),
            records: HashMap::new(),
            titles: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ReadmeConfig {
        &self.config
    }

    pub fn set_inventory(&mut self, inventory: Inventory) {
        self.inventory = inventory;
    }

    pub fn register_title(&mut self, docname: &str, title: &str) {
        self.titles.insert(docname.to_string(), title.to_string());
    }

    /// Loads and pre-processes every configured source file.
    pub fn env_ready(&mut self) -> Result<()> {
        for src in self.config.src_files.keys() {
            let text = self
                .config
                .read_rst(src)
                .with_context(|| format!("failed to read {}", src.display()))?;
            self.sources.insert(src.clone(), text);
        }
        info!("loaded {} rst source files", self.sources.len());
        Ok(())
    }

    /// Harvests the host's Python domain registry into the reference map.
    pub fn harvest_python(&mut self, objects: &[PyDomainObject]) {
        Harvester::new(&self.config).harvest_python(&mut self.ref_map, objects);
    }

    /// Harvests the host's standard domain registry.
    pub fn harvest_std(&mut self, objects: &[StdDomainObject]) {
        Harvester::new(&self.config).harvest_std(&mut self.ref_map, objects);
    }

    /// Runs the structural parse for a resolved document tree, if the
    /// document is one of the files being converted.
    pub fn doctree_resolved(&mut self, tree: &Doctree, reparse: ReparseFn) {
        if !self.is_convertible(&tree.docname) {
            return;
        }
        let parser = DocumentParser::new(&self.config, &self.titles);
        let records = parser.parse(tree, reparse);
        self.records.insert(tree.docname.clone(), records);
    }

    fn is_convertible(&self, docname: &str) -> bool {
        self.config
            .src_files
            .keys()
            .any(|src| self.docname_of(src).as_deref() == Some(docname))
    }

    fn docname_of(&self, src: &Path) -> Option<String> {
        let rel = src.strip_prefix(&self.config.src_dir).ok()?;
        Some(rel.with_extension("").to_string_lossy().replace('\\', "/"))
    }

    /// Rewrites every source file and writes the generated outputs.
    pub fn build_finished(&self) -> Result<()> {
        fs::create_dir_all(&self.config.out_dir)
            .with_context(|| format!("failed to create {}", self.config.out_dir.display()))?;

        let engine = RewriteEngine::new(&self.config, &self.ref_map, &self.inventory);
        let empty = DocumentRecords::default();

        for (src, out) in &self.config.src_files {
            let docname = self
                .docname_of(src)
                .unwrap_or_else(|| src.file_stem().unwrap_or_default().to_string_lossy().into_owned());
            let text = match self.sources.get(src) {
                Some(text) => text.clone(),
                None => self
                    .config
                    .read_rst(src)
                    .with_context(|| format!("failed to read {}", src.display()))?,
            };
            let records = self.records.get(&docname).unwrap_or(&empty);

            let rewritten = engine.rewrite(&docname, src, &text, records)?;

            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(out, rewritten)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!("saved generated rst file to {}", out.display());
        }

        Ok(())
    }
}
