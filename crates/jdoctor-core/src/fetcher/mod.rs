//! Probe source URIs and the Source Fetcher.
//!
//! A probe source is one of:
//! - `file://<path>` or a bare path
//! - `github://<org>/<repo>//<path>[?<ref>]`
//!
//! Fetching materializes the source under a staging root and returns one
//! [`FetchedFile`] per regular file, each carrying the relative identity path
//! that is used as its display name.

mod github;
mod local;

pub use github::GithubFetcher;
pub use local::LocalFetcher;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{DoctorError, Result};

const DEFAULT_REF: &str = "main";

/// Where a probe source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A path on the local filesystem.
    File { path: String },
    /// A path inside a GitHub repository at a branch or tag.
    Github {
        org: String,
        repo: String,
        path: String,
        reference: String,
    },
}

/// A parsed probe source URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeUri {
    raw: String,
    location: SourceLocation,
}

impl ProbeUri {
    /// Parse a probe source URI.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| DoctorError::InvalidUri {
            uri: raw.to_string(),
            reason: reason.to_string(),
        };

        let location = if let Some(path) = raw.strip_prefix("file://") {
            if path.is_empty() {
                return Err(invalid("empty path"));
            }
            SourceLocation::File {
                path: path.to_string(),
            }
        } else if let Some(rest) = raw.strip_prefix("github://") {
            let (locator, reference) = match rest.split_once('?') {
                Some((locator, reference)) if !reference.is_empty() => {
                    (locator, reference.to_string())
                }
                Some((locator, _)) => (locator, DEFAULT_REF.to_string()),
                None => (rest, DEFAULT_REF.to_string()),
            };
            let (org_and_repo, path) = locator
                .split_once("//")
                .ok_or_else(|| invalid("use '//' to separate the repository from the path"))?;
            let (org, repo) = org_and_repo
                .split_once('/')
                .filter(|(org, repo)| !org.is_empty() && !repo.is_empty() && !repo.contains('/'))
                .ok_or_else(|| invalid("expected '<org>/<repo>' before '//'"))?;
            SourceLocation::Github {
                org: org.to_string(),
                repo: repo.to_string(),
                path: path.trim_matches('/').to_string(),
                reference,
            }
        } else if raw.contains("://") {
            return Err(invalid("unsupported scheme"));
        } else if raw.is_empty() {
            return Err(invalid("empty path"));
        } else {
            SourceLocation::File {
                path: raw.to_string(),
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            location,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// The file or directory path the URI points at, within its source.
    pub fn target_path(&self) -> &str {
        match &self.location {
            SourceLocation::File { path } => path,
            SourceLocation::Github { path, .. } => path,
        }
    }

    /// Lower-cased extension of the target, if it has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.target_path())
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// The relative identity path: the location with `/` flattened to `_`.
    pub fn flattened_name(&self) -> String {
        let location = match &self.location {
            SourceLocation::File { path } => path.trim_matches('/').to_string(),
            SourceLocation::Github { org, repo, path, .. } => format!("{org}/{repo}//{path}"),
        };
        location.trim_start_matches("./").replace('/', "_")
    }

    /// A key that is equal for two URIs naming the same source.
    pub fn canonical(&self) -> String {
        match &self.location {
            SourceLocation::File { path } => std::fs::canonicalize(path)
                .map(|p| format!("file://{}", p.display()))
                .unwrap_or_else(|_| format!("file://{path}")),
            SourceLocation::Github {
                org,
                repo,
                path,
                reference,
            } => format!("github://{org}/{repo}//{path}?{reference}"),
        }
    }
}

impl fmt::Display for ProbeUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One materialized probe file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Relative identity path (display name).
    pub name: String,
    /// Location of the copy under the staging root.
    pub local_path: PathBuf,
    /// The per-fetch directory under the staging root that holds the copy.
    pub root: PathBuf,
}

impl FetchedFile {
    /// Whether the file is a ruleset document.
    pub fn is_ruleset(&self) -> bool {
        crate::ruleset::is_ruleset_path(&self.local_path)
    }
}

/// Materializes probe sources into a local staging directory.
pub trait SourceFetcher {
    /// Fetch every regular file named by `uri` into `destination`.
    ///
    /// A missing source is reported as [`DoctorError::SourceNotFound`].
    fn fetch(&self, uri: &ProbeUri, destination: &Path) -> Result<Vec<FetchedFile>>;
}

/// Dispatches to the fetcher for the URI's scheme.
#[derive(Debug, Default)]
pub struct Fetcher {
    local: LocalFetcher,
    github: GithubFetcher,
}

impl SourceFetcher for Fetcher {
    fn fetch(&self, uri: &ProbeUri, destination: &Path) -> Result<Vec<FetchedFile>> {
        match uri.location() {
            SourceLocation::File { .. } => self.local.fetch(uri, destination),
            SourceLocation::Github { .. } => self.github.fetch(uri, destination),
        }
    }
}
