//! Repository hosting platform identity and URL shaping.
//!
//! Resolves the canonical web URL of the project's repository from the
//! host build's `html_context`-style identity fields, and derives the
//! blob and raw-content base URLs used throughout the rewrite engine.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReadmeError, Result};

lazy_static! {
    /// GitHub usernames: alphanumeric and hyphens, no leading/trailing or
    /// consecutive hyphens. Length is checked separately.
    static ref GITHUB_USER: Regex =
        Regex::new(r"^[A-Za-z\d](?:-?[A-Za-z\d])*$").unwrap();
    static ref GITHUB_REPO: Regex = Regex::new(r"^[A-Za-z\d_.-]{1,100}$").unwrap();
    /// GitLab namespaces allow dots and underscores as internal separators.
    static ref GITLAB_USER: Regex =
        Regex::new(r"^[A-Za-z\d](?:[._-]?[A-Za-z\d])*$").unwrap();
    static ref GITLAB_REPO: Regex = Regex::new(r"^[A-Za-z\d][A-Za-z\d_.+-]*$").unwrap();
    static ref BITBUCKET_USER: Regex = Regex::new(r"^[A-Za-z\d_-]{1,62}$").unwrap();
    static ref BITBUCKET_REPO: Regex = Regex::new(r"^[A-Za-z\d_.-]{1,62}$").unwrap();
}

/// The platform that a project's repository is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoHost {
    GitHub,
    GitLab,
    BitBucket,
}

impl RepoHost {
    /// Parses the hosting platform from a repository URL.
    pub fn from_url(repo_url: &str) -> Option<RepoHost> {
        lazy_static! {
            static ref HOST: Regex = Regex::new(r"^https?://(\w+)\.(?:com|org)").unwrap();
        }
        match HOST.captures(repo_url)?.get(1)?.as_str() {
            "github" => Some(RepoHost::GitHub),
            "gitlab" => Some(RepoHost::GitLab),
            "bitbucket" => Some(RepoHost::BitBucket),
            _ => None,
        }
    }

    fn base_url(self) -> &'static str {
        match self {
            RepoHost::GitHub => "https://github.com",
            RepoHost::GitLab => "https://gitlab.com",
            RepoHost::BitBucket => "https://bitbucket.org",
        }
    }

    fn validate(self, user: &str, repo: &str) -> bool {
        match self {
            RepoHost::GitHub => {
                user.len() <= 39 && GITHUB_USER.is_match(user) && GITHUB_REPO.is_match(repo)
            }
            RepoHost::GitLab => {
                user.len() <= 255 && GITLAB_USER.is_match(user) && GITLAB_REPO.is_match(repo)
            }
            RepoHost::BitBucket => BITBUCKET_USER.is_match(user) && BITBUCKET_REPO.is_match(repo),
        }
    }
}

impl std::fmt::Display for RepoHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoHost::GitHub => write!(f, "github"),
            RepoHost::GitLab => write!(f, "gitlab"),
            RepoHost::BitBucket => write!(f, "bitbucket"),
        }
    }
}

/// Identity fields for one hosting platform, as found in the host
/// build's `html_context` dict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostIdentity {
    pub user: Option<String>,
    pub repo: Option<String>,
    /// Branch/tag the docs were built from, if the context provides one.
    pub version: Option<String>,
}

/// Per-platform identity fields from the host build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostContext {
    pub github: HostIdentity,
    pub gitlab: HostIdentity,
    pub bitbucket: HostIdentity,
}

impl HostContext {
    fn identity(&self, host: RepoHost) -> &HostIdentity {
        match host {
            RepoHost::GitHub => &self.github,
            RepoHost::GitLab => &self.gitlab,
            RepoHost::BitBucket => &self.bitbucket,
        }
    }

    /// Resolves the repository's canonical web URL.
    ///
    /// The first platform with both a user and repo name wins. Names are
    /// validated against the platform's naming constraints.
    pub fn repo_url(&self) -> Result<String> {
        for host in [RepoHost::GitHub, RepoHost::GitLab, RepoHost::BitBucket] {
            let identity = self.identity(host);
            let (user, repo) = match (&identity.user, &identity.repo) {
                (Some(user), Some(repo)) => (user, repo),
                _ => continue,
            };

            if !host.validate(user, repo) {
                return Err(ReadmeError::config(format!(
                    "invalid {} username or repository name: {}/{}",
                    host, user, repo
                )));
            }

            return Ok(format!("{}/{}/{}", host.base_url(), user, repo));
        }

        Err(ReadmeError::config(
            "unable to determine repository url: no hosting platform \
             identity found in the host context",
        ))
    }

    /// Returns the blob from the context's version field, if any platform
    /// provides one.
    pub fn version(&self) -> Option<&str> {
        [&self.github, &self.gitlab, &self.bitbucket]
            .into_iter()
            .find_map(|identity| identity.version.as_deref())
    }
}

/// Generates the base URL for a specific blob of a repository.
pub fn blob_url(repo_url: &str, blob: &str) -> String {
    let repo_url = repo_url.trim_end_matches('/');
    match RepoHost::from_url(repo_url) {
        Some(RepoHost::BitBucket) => format!("{}/src/{}", repo_url, blob),
        _ => format!("{}/blob/{}", repo_url, blob),
    }
}

/// The base URL for raw file content of a blob, used when rewriting
/// image paths. Hosting platforms render these standalone.
pub fn raw_content_url(blob_url: &str, host: RepoHost) -> String {
    match host {
        // https://raw.githubusercontent.com/user/repo/main
        RepoHost::GitHub => blob_url
            .replace("github.com", "raw.githubusercontent.com")
            .replace("blob/", ""),
        // https://gitlab.com/user/repo/raw/main
        RepoHost::GitLab => blob_url.replace("/blob/", "/raw/"),
        // https://bitbucket.org/user/repo/raw/main
        RepoHost::BitBucket => blob_url.replace("/src/", "/raw/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_context(user: &str, repo: &str) -> HostContext {
        HostContext {
            github: HostIdentity {
                user: Some(user.to_string()),
                repo: Some(repo.to_string()),
                version: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_repo_url_github() {
        let context = github_context("tdkorn", "sphinx-readme");
        assert_eq!(
            context.repo_url().unwrap(),
            "https://github.com/tdkorn/sphinx-readme"
        );
    }

    #[test]
    fn test_repo_url_bitbucket_tld() {
        let context = HostContext {
            bitbucket: HostIdentity {
                user: Some("team".to_string()),
                repo: Some("project".to_string()),
                version: None,
            },
            ..Default::default()
        };
        assert_eq!(
            context.repo_url().unwrap(),
            "https://bitbucket.org/team/project"
        );
    }

    #[test]
    fn test_repo_url_missing_identity() {
        let context = HostContext::default();
        assert!(context.repo_url().is_err());
    }

    #[test]
    fn test_invalid_github_username() {
        // Consecutive hyphens are not allowed in GitHub usernames
        let context = github_context("bad--name", "repo");
        assert!(context.repo_url().is_err());

        // Trailing hyphen
        let context = github_context("name-", "repo");
        assert!(context.repo_url().is_err());
    }

    #[test]
    fn test_host_from_url() {
        assert_eq!(
            RepoHost::from_url("https://github.com/user/repo"),
            Some(RepoHost::GitHub)
        );
        assert_eq!(
            RepoHost::from_url("https://bitbucket.org/user/repo"),
            Some(RepoHost::BitBucket)
        );
        assert_eq!(RepoHost::from_url("https://example.net/user/repo"), None);
    }

    #[test]
    fn test_blob_url() {
        assert_eq!(
            blob_url("https://github.com/user/repo/", "main"),
            "https://github.com/user/repo/blob/main"
        );
        assert_eq!(
            blob_url("https://bitbucket.org/user/repo", "main"),
            "https://bitbucket.org/user/repo/src/main"
        );
    }

    #[test]
    fn test_raw_content_url() {
        assert_eq!(
            raw_content_url("https://github.com/user/repo/blob/main", RepoHost::GitHub),
            "https://raw.githubusercontent.com/user/repo/main"
        );
        assert_eq!(
            raw_content_url("https://gitlab.com/user/repo/blob/main", RepoHost::GitLab),
            "https://gitlab.com/user/repo/raw/main"
        );
        assert_eq!(
            raw_content_url("https://bitbucket.org/user/repo/src/main", RepoHost::BitBucket),
            "https://bitbucket.org/user/repo/raw/main"
        );
    }
}
