//! reStructuredText text utilities.
//!
//! Shared helpers for the structural parser and rewrite engine: inline
//! markup formatting, `only`/`raw` directive handling, cross-reference
//! variant expansion, and the adjacency rules that decide whether inline
//! markup is recognized at a given position.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Characters that are valid RST section adornments.
pub const SECTION_CHARS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Characters permitted immediately before inline markup
/// (besides whitespace or start-of-text).
pub const BEFORE_XREF: &str = ":[{(/\"'-";

/// Characters permitted immediately after inline markup
/// (besides whitespace or end-of-text).
pub const AFTER_XREF: &str = ".:;!?,\"'/\\])}-";

/// Returns true if `c` may precede inline markup (`None` = start of text).
pub fn valid_before(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => c.is_whitespace() || BEFORE_XREF.contains(c),
    }
}

/// Returns true if `c` may follow inline markup (`None` = end of text).
pub fn valid_after(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => c.is_whitespace() || AFTER_XREF.contains(c),
    }
}

/// Inline markup styles for [`format_rst`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineFormat {
    Bold,
    Italic,
}

/// Formats text with inline markup, preserving any ``inline literals``.
///
/// ```
/// use readme_rst::rst::{format_rst, InlineFormat};
///
/// let formatted = format_rst(InlineFormat::Bold, "part of the ``utils`` module");
/// assert_eq!(formatted, "**part of the** ``utils`` **module**");
/// ```
pub fn format_rst(markup: InlineFormat, rst: &str) -> String {
    lazy_static! {
        static ref LITERAL: Regex = Regex::new(r"``.+?``").unwrap();
    }
    let adornment = match markup {
        InlineFormat::Bold => "**",
        InlineFormat::Italic => "*",
    };

    let mut parts = Vec::new();
    let mut last = 0;

    for m in LITERAL.find_iter(rst) {
        let before = rst[last..m.start()].trim();
        if !before.is_empty() {
            parts.push(format!("{}{}{}", adornment, before, adornment));
        }
        parts.push(m.as_str().to_string());
        last = m.end();
    }

    let rest = rst[last..].trim();
    if !rest.is_empty() {
        parts.push(format!("{}{}{}", adornment, rest, adornment));
    }

    parts.join(" ")
}

/// Evaluates an `only::` directive expression against a set of tags.
///
/// Supports the `or`, `and`, and `not` operators without grouping, which
/// covers the expressions found in practice (`readme`, `html or readme`,
/// `not html`).
pub fn eval_condition(expression: &str, tags: &HashSet<String>) -> bool {
    expression.split(" or ").any(|clause| {
        clause.split(" and ").all(|term| {
            let term = term.trim();
            match term.strip_prefix("not ") {
                Some(tag) => !tags.contains(tag.trim()),
                None => tags.contains(term),
            }
        })
    })
}

/// Replaces and removes `only::` directives.
///
/// If the directive's expression evaluates true against `tags`, the
/// directive is replaced with its dedented content; otherwise the whole
/// block is removed.
pub fn replace_only_directives(rst: &str, tags: &HashSet<String>) -> String {
    lazy_static! {
        static ref ONLY: Regex = Regex::new(
            r"(?ms)^\.\. only::\s+(?P<expr>\S.*?)\n+(?P<content>(?:^[ ]+.*?$\n?|^\s*$\n?)+)"
        )
        .unwrap();
    }

    ONLY.replace_all(rst, |caps: &regex::Captures| {
        let expression = caps["expr"].trim();
        if eval_condition(expression, tags) {
            let content = &caps["content"];
            let mut dedented: Vec<&str> = Vec::new();
            for line in content.lines() {
                // Directive bodies are indented by three spaces
                dedented.push(line.strip_prefix("   ").unwrap_or(line.trim_start_matches(' ')));
            }
            format!("{}\n", dedented.join("\n"))
        } else {
            String::new()
        }
    })
    .into_owned()
}

/// Removes all `raw::` directives.
pub fn remove_raw_directives(rst: &str) -> String {
    lazy_static! {
        static ref RAW: Regex =
            Regex::new(r"(?ms)^\.\. raw::\s+\S.*?\n+(?:^[ ]+.*?$\n?|^\s*$\n?)+").unwrap();
    }
    RAW.replace_all(rst, "").into_owned()
}

/// Returns the four ways to spell a cross-reference to `target`.
///
/// ```
/// use readme_rst::rst::get_xref_variants;
///
/// assert_eq!(
///     get_xref_variants("mod.Class.meth"),
///     ["mod.Class.meth", ".mod.Class.meth", "~mod.Class.meth", "~.mod.Class.meth"]
/// );
/// ```
pub fn get_xref_variants(target: &str) -> Vec<String> {
    ["", ".", "~", "~."]
        .iter()
        .map(|prefix| format!("{}{}", prefix, target))
        .collect()
}

/// Returns every possible cross-reference spelling for an object.
///
/// Each contiguous suffix of the dotted path, from the bare last segment
/// up to the fully qualified name, is expanded into all four prefix forms,
/// yielding `4 × n` variants for a name with `n` segments.
pub fn get_all_xref_variants(fully_qualified_name: &str) -> Vec<String> {
    let parts: Vec<&str> = fully_qualified_name.split('.').collect();
    let mut variants = Vec::with_capacity(4 * parts.len());

    for start in (0..parts.len()).rev() {
        let target = parts[start..].join(".");
        variants.extend(get_xref_variants(&target));
    }

    variants
}
