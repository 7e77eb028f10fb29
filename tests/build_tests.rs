//! End-to-end tests for the readme generation pipeline.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use indexmap::IndexMap;
use readme_rst::builder::ReadmeBuilder;
use readme_rst::config::{LinkMode, ReadmeOptions};
use readme_rst::doctree::{AdmonitionNode, DocNode, Doctree, RubricNode, ToctreeEntryNode, ToctreeNode};
use readme_rst::harvest::{PyDomainObject, PyObjtype, StdDomainObject};
use readme_rst::host::{HostContext, HostIdentity};
use readme_rst::inventory::{Inventory, InventoryItem};
use readme_rst::linkcode::{SourceIndex, SourceLocation};
use readme_rst::ref_map::Role;

fn options(src_dir: &Path, src_files: &[&str]) -> ReadmeOptions {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut files = IndexMap::new();
    for file in src_files {
        files.insert(file.to_string(), None);
    }
    ReadmeOptions {
        src_dir: src_dir.to_path_buf(),
        out_dir: src_dir.join("out"),
        src_files: files,
        html_baseurl: Some("https://docs.example.com".to_string()),
        html_context: HostContext {
            github: HostIdentity {
                user: Some("user".to_string()),
                repo: Some("repo".to_string()),
                version: None,
            },
            ..Default::default()
        },
        blob: "main".to_string(),
        repo_dir: Some(src_dir.to_path_buf()),
        ..Default::default()
    }
}

fn source_index() -> SourceIndex {
    let mut index = SourceIndex::new();
    index.add_object(
        "pkg.Class.method",
        SourceLocation {
            filepath: "pkg/models.py".to_string(),
            linestart: 10,
            linestop: 20,
        },
    );
    index.add_object(
        "pkg.Class",
        SourceLocation {
            filepath: "pkg/models.py".to_string(),
            linestart: 5,
            linestop: 40,
        },
    );
    index.add_module("pkg", "pkg/__init__.py");
    index
}

fn domain_objects() -> Vec<PyDomainObject> {
    vec![
        PyDomainObject {
            module: "pkg".to_string(),
            fullname: String::new(),
            objtype: PyObjtype::Module,
            docname: "api".to_string(),
            anchor: "module-pkg".to_string(),
        },
        PyDomainObject {
            module: "pkg".to_string(),
            fullname: "Class".to_string(),
            objtype: PyObjtype::Class,
            docname: "api".to_string(),
            anchor: "pkg.Class".to_string(),
        },
        PyDomainObject {
            module: "pkg".to_string(),
            fullname: "Class.method".to_string(),
            objtype: PyObjtype::Method,
            docname: "api".to_string(),
            anchor: "pkg.Class.method".to_string(),
        },
        PyDomainObject {
            module: "pkg".to_string(),
            fullname: "Class.attribute".to_string(),
            objtype: PyObjtype::Attribute,
            docname: "api".to_string(),
            anchor: "pkg.Class.attribute".to_string(),
        },
    ]
}

fn no_reparse(_: &str, _: &str) -> Doctree {
    panic!("re-parse should not be needed");
}

#[test]
fn test_every_spelling_of_a_method_resolves() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("index.rst"), "Stub\n").unwrap();

    let spellings = [
        "method",
        ".method",
        "~method",
        "~.method",
        "Class.method",
        ".Class.method",
        "~Class.method",
        "~.Class.method",
        "pkg.Class.method",
        ".pkg.Class.method",
        "~pkg.Class.method",
        "~.pkg.Class.method",
    ];

    for spelling in spellings {
        let source = format!("Call :meth:`{}` now.\n", spelling);
        fs::write(temp.path().join("index.rst"), &source).unwrap();

        let mut builder =
            ReadmeBuilder::new(options(temp.path(), &["index.rst"]), source_index()).unwrap();
        builder.env_ready().unwrap();
        builder.harvest_python(&domain_objects());
        builder.build_finished().unwrap();

        let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
        assert!(
            !out.contains(":meth:"),
            "spelling {} was not converted",
            spelling
        );
        assert!(
            out.contains("pkg/models.py#L10-L20"),
            "spelling {} did not link to the source range",
            spelling
        );
    }
}

#[test]
fn test_tilde_and_dot_spellings_display_differently() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.rst"),
        "See :attr:`~pkg.Class.attribute` and :attr:`.Class.attribute`.\n",
    )
    .unwrap();

    let mut opts = options(temp.path(), &["index.rst"]);
    opts.docs_url_type = LinkMode::Html;
    let mut builder = ReadmeBuilder::new(opts, source_index()).unwrap();
    builder.env_ready().unwrap();
    builder.harvest_python(&domain_objects());
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert!(out.contains(".. |~pkg.Class.attribute| replace:: ``attribute``"));
    assert!(out.contains(".. |.Class.attribute| replace:: ``Class.attribute``"));
    assert!(out.contains("https://docs.example.com/api.html#pkg.Class.attribute"));
}

#[test]
fn test_attributes_downgrade_in_code_mode() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.rst"),
        "The :attr:`~pkg.Class.attribute` field.\n",
    )
    .unwrap();

    let mut builder =
        ReadmeBuilder::new(options(temp.path(), &["index.rst"]), source_index()).unwrap();
    builder.env_ready().unwrap();
    builder.harvest_python(&domain_objects());
    builder.build_finished().unwrap();

    // No source range exists for an attribute, so it becomes a literal
    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert_eq!(out, "The ``attribute`` field.\n");
}

#[test]
fn test_admonition_toctree_and_rubric_conversion() {
    let temp = TempDir::new().unwrap();
    let source = "Overview\n========\n\n.. note::\n\n   Read the docs.\n\n\
                  .. toctree::\n   :caption: Contents\n\n   guide\n\n\
                  .. rubric:: See Also\n";
    fs::write(temp.path().join("index.rst"), source).unwrap();

    let mut opts = options(temp.path(), &["index.rst"]);
    opts.rubric_heading = Some("-".to_string());
    let mut builder = ReadmeBuilder::new(opts, source_index()).unwrap();
    builder.env_ready().unwrap();
    builder.register_title("guide", "User Guide");

    let mut tree = Doctree::new("index", source);
    tree.nodes.push(DocNode::Admonition(AdmonitionNode {
        classes: vec!["note".to_string()],
        title: None,
        body: "Read the docs.".to_string(),
    }));
    tree.nodes.push(DocNode::Toctree(ToctreeNode {
        caption: Some("Contents".to_string()),
        maxdepth: None,
        titles_only: false,
        entries: vec![ToctreeEntryNode {
            title: None,
            target: "guide".to_string(),
            subtree: None,
        }],
    }));
    tree.nodes.push(DocNode::Rubric(RubricNode {
        text: "See Also".to_string(),
    }));
    builder.doctree_resolved(&tree, &no_reparse);
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert!(out.contains("<table>"));
    assert!(out.contains("📝 Note"));
    assert!(out.contains("Read the docs."));
    assert!(out.contains("**Contents**"));
    assert!(out.contains("* `User Guide <https://docs.example.com/guide.html>`_"));
    assert!(out.contains("See Also\n--------"));
    assert!(!out.contains("toctree::"));
    assert!(!out.contains("rubric::"));
}

#[test]
fn test_only_and_include_directives_in_sources() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("badges.rst"), "|build badge|\n").unwrap();
    fs::write(
        temp.path().join("index.rst"),
        ".. include:: badges.rst\n\n.. only:: readme\n\n   Readme-only text\n\n\
         .. only:: html\n\n   Html-only text\n",
    )
    .unwrap();

    let mut builder =
        ReadmeBuilder::new(options(temp.path(), &["index.rst"]), SourceIndex::new()).unwrap();
    builder.env_ready().unwrap();
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert!(out.contains("|build badge|"));
    assert!(out.contains("Readme-only text"));
    assert!(!out.contains("Html-only text"));
    assert!(!out.contains("include::"));
}

#[test]
fn test_intersphinx_fallback_resolution() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.rst"),
        "Wraps :meth:`requests.Session.get` internally.\n",
    )
    .unwrap();

    let mut inventory = Inventory::new();
    inventory.add(
        "method",
        "requests.Session.get",
        InventoryItem {
            package: "requests".to_string(),
            version: "2.0".to_string(),
            uri: "https://requests.dev/api.html#requests.Session.get".to_string(),
            label: "requests.Session.get".to_string(),
        },
    );

    let mut builder =
        ReadmeBuilder::new(options(temp.path(), &["index.rst"]), SourceIndex::new()).unwrap();
    builder.set_inventory(inventory);
    builder.env_ready().unwrap();
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert!(out.contains("|requests.Session.get|_"));
    assert!(out.contains(".. |requests.Session.get| replace:: ``requests.Session.get()``"));
    assert!(out.contains(".. _requests.Session.get: https://requests.dev/api.html#requests.Session.get"));
}

#[test]
fn test_doc_and_label_references() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.rst"),
        "Read :doc:`/guide` and :ref:`Getting Started`.\n",
    )
    .unwrap();

    let mut builder =
        ReadmeBuilder::new(options(temp.path(), &["index.rst"]), SourceIndex::new()).unwrap();
    builder.env_ready().unwrap();
    builder.harvest_std(&[
        StdDomainObject {
            objtype: "doc".to_string(),
            name: "guide".to_string(),
            docname: "guide".to_string(),
            anchor: String::new(),
            display: "User Guide".to_string(),
        },
        StdDomainObject {
            objtype: "label".to_string(),
            name: "Getting Started".to_string(),
            docname: "intro".to_string(),
            anchor: "getting-started".to_string(),
            display: "Getting Started".to_string(),
        },
    ]);
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert!(out.contains("`User Guide <https://docs.example.com/guide.html>`_"));
    assert!(out.contains("`Getting Started <https://docs.example.com/intro.html#getting-started>`_"));
}

#[test]
fn test_substitution_header_is_sorted_and_deduplicated() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.rst"),
        ":meth:`~pkg.Class.method` and :class:`~pkg.Class` and :meth:`~pkg.Class.method` again.\n",
    )
    .unwrap();

    let mut builder =
        ReadmeBuilder::new(options(temp.path(), &["index.rst"]), source_index()).unwrap();
    builder.env_ready().unwrap();
    builder.harvest_python(&domain_objects());
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    let class_pos = out.find(".. |~pkg.Class| replace::").unwrap();
    let method_pos = out.find(".. |~pkg.Class.method| replace::").unwrap();
    assert!(class_pos < method_pos);
    assert_eq!(out.matches(".. |~pkg.Class.method| replace::").count(), 1);
}

#[test]
fn test_strict_resolution_fails_the_build() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("index.rst"), ":func:`nowhere.to.be.found`\n").unwrap();

    let mut opts = options(temp.path(), &["index.rst"]);
    opts.strict_resolution = true;
    let mut builder = ReadmeBuilder::new(opts, SourceIndex::new()).unwrap();
    builder.env_ready().unwrap();

    assert!(builder.build_finished().is_err());
}

#[test]
fn test_custom_role_from_std_domain() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.rst"),
        "Set :confval:`readme_out_dir` in your configuration.\n",
    )
    .unwrap();

    let mut builder =
        ReadmeBuilder::new(options(temp.path(), &["index.rst"]), SourceIndex::new()).unwrap();
    builder.env_ready().unwrap();
    builder.harvest_std(&[StdDomainObject {
        objtype: "confval".to_string(),
        name: "readme_out_dir".to_string(),
        docname: "configuration".to_string(),
        anchor: "confval-readme_out_dir".to_string(),
        display: "readme_out_dir".to_string(),
    }]);
    builder.build_finished().unwrap();

    let out = fs::read_to_string(temp.path().join("out").join("index.rst")).unwrap();
    assert!(out.contains(
        "`readme_out_dir <https://docs.example.com/configuration.html#confval-readme_out_dir>`_"
    ));
    assert!(!out.contains(":confval:"));
}

#[test]
fn test_role_parse_matches_harvested_roles() {
    // Domain-prefixed spellings address the same namespace
    assert_eq!(Role::parse("py:meth"), Role::Meth);
    assert_eq!(Role::parse("std:ref"), Role::Ref);
}
