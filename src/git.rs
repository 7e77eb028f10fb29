//! Git metadata discovery.
//!
//! Thin wrappers around the `git` command line tool for resolving the
//! commit hash, tag, or repository root used when building blob URLs.
//! All invocations are synchronous; a failure is fatal and never retried.

use log::debug;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{ReadmeError, Result};

/// Runs a git command and returns its trimmed stdout.
fn git_output(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .map_err(|e| ReadmeError::git(format!("failed to run git {}: {}", args.join(" "), e)))?;

    if !output.status.success() {
        return Err(ReadmeError::git(format!(
            "git {} exited with {}",
            args.join(" "),
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Returns the hash of the most recent commit.
///
/// If the most recent commit is exactly tagged, the tag is returned instead.
pub fn get_head() -> Result<String> {
    let head = git_output(&["log", "-n1", "--pretty=%H"])
        .map_err(|_| ReadmeError::git("failed to determine the most recent commit".to_string()))?;

    match git_output(&["describe", "--exact-match", "--tags", &head]) {
        Ok(tag) => {
            debug!("head commit {} is tagged as {}", head, tag);
            Ok(tag)
        }
        Err(_) => Ok(head),
    }
}

/// Returns the most recent commit tag.
pub fn get_last_tag() -> Result<String> {
    git_output(&["describe", "--tags", "--abbrev=0"])
        .map_err(|_| ReadmeError::git("no tags exist for the repository".to_string()))
}

/// Resolves a blob selector to a concrete git blob.
///
/// * `"head"` - the hash of the most recent commit (or its tag, if exactly tagged)
/// * `"last_tag"` - the most recent commit tag
/// * anything else - used as-is (a branch, tag, or commit name)
pub fn get_blob(blob: &str) -> Result<String> {
    match blob {
        "head" => get_head(),
        "last_tag" => get_last_tag(),
        other => Ok(other.to_string()),
    }
}

/// Returns the root directory of the repository.
pub fn get_repo_dir() -> Result<PathBuf> {
    let dir = git_output(&["rev-parse", "--show-toplevel"])
        .map_err(|_| ReadmeError::git("unable to determine the repository directory".to_string()))?;
    let repo_dir = PathBuf::from(dir);

    // On ReadTheDocs the repo is cloned to <repo_dir>/checkouts/<version>/
    let is_checkout = repo_dir
        .parent()
        .and_then(|p| p.file_name())
        .map(|name| name == "checkouts")
        .unwrap_or(false);

    if is_checkout {
        Ok(repo_dir
            .parent()
            .and_then(|p| p.parent())
            .map(PathBuf::from)
            .unwrap_or(repo_dir))
    } else {
        Ok(repo_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_blob_literal() {
        // Literal blob names pass through without touching git
        assert_eq!(get_blob("master").unwrap(), "master");
        assert_eq!(get_blob("v2.0.1").unwrap(), "v2.0.1");
    }

    #[test]
    fn test_git_output_bad_command() {
        let result = git_output(&["not-a-real-subcommand"]);
        assert!(result.is_err());
    }
}
