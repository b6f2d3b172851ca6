use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::local::copy_source;
use super::{FetchedFile, ProbeUri, SourceFetcher, SourceLocation};
use crate::error::{DoctorError, Result};

/// Staging root, org, repo and ref of one checkout.
type CheckoutKey = (PathBuf, String, String, String);

/// Shallow-clones GitHub repositories with the `git` CLI.
///
/// A repository is cloned once per (staging root, org, repo, ref); later
/// references to the same checkout copy out of the existing clone.
#[derive(Debug)]
pub struct GithubFetcher {
    base_url: String,
    checkouts: Mutex<HashMap<CheckoutKey, PathBuf>>,
}

impl Default for GithubFetcher {
    fn default() -> Self {
        Self::with_base_url("https://github.com")
    }
}

impl GithubFetcher {
    /// Clone from a different host (e.g. a mirror or a local `file://` path).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            checkouts: Mutex::new(HashMap::new()),
        }
    }

    fn clone_url(&self, org: &str, repo: &str) -> String {
        format!("{}/{}/{}", self.base_url, org, repo)
    }

    /// Number of repositories cloned so far.
    pub fn clone_count(&self) -> usize {
        self.checkouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn checkout(
        &self,
        uri: &ProbeUri,
        destination: &Path,
        org: &str,
        repo: &str,
        reference: &str,
    ) -> Result<PathBuf> {
        let key = (
            destination.to_path_buf(),
            org.to_string(),
            repo.to_string(),
            reference.to_string(),
        );
        let mut checkouts = self
            .checkouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = checkouts.get(&key) {
            debug!(uri = %uri, checkout = %existing.display(), "reusing probe repository");
            return Ok(existing.clone());
        }

        let checkout = destination
            .join(".clones")
            .join(uuid::Uuid::new_v4().to_string());
        let url = self.clone_url(org, repo);
        debug!(uri = %uri, url = %url, reference = %reference, "cloning probe repository");

        let output = Command::new("git")
            .args(["clone", "--quiet", "--depth", "1", "--branch", reference])
            .arg(&url)
            .arg(&checkout)
            .output()
            .map_err(|e| DoctorError::Fetch {
                uri: uri.to_string(),
                reason: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DoctorError::Fetch {
                uri: uri.to_string(),
                reason: format!("git clone failed: {}", stderr.trim()),
            });
        }

        checkouts.insert(key, checkout.clone());
        Ok(checkout)
    }
}

impl SourceFetcher for GithubFetcher {
    fn fetch(&self, uri: &ProbeUri, destination: &Path) -> Result<Vec<FetchedFile>> {
        let SourceLocation::Github {
            org,
            repo,
            path,
            reference,
        } = uri.location()
        else {
            return Err(DoctorError::InvalidUri {
                uri: uri.to_string(),
                reason: "not a github:// uri".to_string(),
            });
        };

        let checkout = self.checkout(uri, destination, org, repo, reference)?;
        copy_source(uri, &checkout.join(path), &uri.flattened_name(), destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// A local `<host>/<org>/<repo>` git repository with probes on `main`.
    fn make_remote() -> tempfile::TempDir {
        let host = tempfile::tempdir().unwrap();
        let repo = host.path().join("canonical").join("probes-repo");
        fs::create_dir_all(repo.join("probes")).unwrap();
        fs::write(repo.join("probes/alpha.py"), "").unwrap();
        fs::write(repo.join("probes/beta.py"), "").unwrap();
        fs::write(repo.join("README.md"), "").unwrap();

        run_git(&repo, &["init", "--quiet"]);
        run_git(&repo, &["checkout", "--quiet", "-b", "main"]);
        run_git(&repo, &["config", "user.name", "test-user"]);
        run_git(&repo, &["config", "user.email", "test@example.com"]);
        run_git(&repo, &["add", "."]);
        run_git(&repo, &["commit", "--quiet", "-m", "probes"]);
        host
    }

    #[test]
    fn test_fetch_github_subdirectory() {
        let host = make_remote();
        let stage = tempfile::tempdir().unwrap();
        let fetcher =
            GithubFetcher::with_base_url(format!("file://{}", host.path().display()));

        let uri = ProbeUri::parse("github://canonical/probes-repo//probes").unwrap();
        let files = fetcher.fetch(&uri, stage.path()).unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "canonical_probes-repo__probes/alpha.py",
                "canonical_probes-repo__probes/beta.py"
            ]
        );
    }

    #[test]
    fn test_same_repository_cloned_once() {
        let host = make_remote();
        let stage = tempfile::tempdir().unwrap();
        let fetcher =
            GithubFetcher::with_base_url(format!("file://{}", host.path().display()));

        let alpha = ProbeUri::parse("github://canonical/probes-repo//probes/alpha.py").unwrap();
        let beta = ProbeUri::parse("github://canonical/probes-repo//probes/beta.py?main").unwrap();
        let first = fetcher.fetch(&alpha, stage.path()).unwrap();
        let second = fetcher.fetch(&beta, stage.path()).unwrap();
        fetcher.fetch(&alpha, stage.path()).unwrap();

        assert_eq!(fetcher.clone_count(), 1);
        assert_eq!(first[0].name, "canonical_probes-repo__probes_alpha.py");
        assert_eq!(second[0].name, "canonical_probes-repo__probes_beta.py");
    }

    #[test]
    fn test_refs_with_same_path_stay_separate() {
        let host = make_remote();
        let repo = host.path().join("canonical").join("probes-repo");
        run_git(&repo, &["checkout", "--quiet", "-b", "v1"]);
        fs::write(repo.join("probes/alpha.py"), "v1\n").unwrap();
        run_git(&repo, &["commit", "--quiet", "-am", "v1"]);

        let stage = tempfile::tempdir().unwrap();
        let fetcher =
            GithubFetcher::with_base_url(format!("file://{}", host.path().display()));
        let main = ProbeUri::parse("github://canonical/probes-repo//probes/alpha.py?main").unwrap();
        let v1 = ProbeUri::parse("github://canonical/probes-repo//probes/alpha.py?v1").unwrap();

        let on_main = fetcher.fetch(&main, stage.path()).unwrap();
        let on_v1 = fetcher.fetch(&v1, stage.path()).unwrap();

        assert_eq!(fetcher.clone_count(), 2);
        assert_eq!(on_main[0].name, on_v1[0].name);
        assert_eq!(fs::read_to_string(&on_main[0].local_path).unwrap(), "");
        assert_eq!(fs::read_to_string(&on_v1[0].local_path).unwrap(), "v1\n");
    }

    #[test]
    fn test_fetch_github_unknown_branch() {
        let host = make_remote();
        let stage = tempfile::tempdir().unwrap();
        let fetcher =
            GithubFetcher::with_base_url(format!("file://{}", host.path().display()));

        let uri = ProbeUri::parse("github://canonical/probes-repo//probes?nope").unwrap();
        let err = fetcher.fetch(&uri, stage.path()).unwrap_err();
        assert!(matches!(err, DoctorError::Fetch { .. }));
    }
}
