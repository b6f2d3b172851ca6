use std::fs;
use std::path::Path;

use tracing::debug;
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use super::{FetchedFile, ProbeUri, SourceFetcher};
use crate::error::{DoctorError, Result};

/// Copies local files and directories into the staging root.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl SourceFetcher for LocalFetcher {
    fn fetch(&self, uri: &ProbeUri, destination: &Path) -> Result<Vec<FetchedFile>> {
        copy_source(
            uri,
            Path::new(uri.target_path()),
            &uri.flattened_name(),
            destination,
        )
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Copy `source` (a file or directory) to `destination/<fetch id>/<name>`.
///
/// Every call gets its own directory, so two sources with the same flattened
/// name never share a staged file. Directories are walked recursively in path
/// order; hidden files and directories are skipped.
pub(super) fn copy_source(
    uri: &ProbeUri,
    source: &Path,
    name: &str,
    destination: &Path,
) -> Result<Vec<FetchedFile>> {
    if !source.exists() {
        return Err(DoctorError::SourceNotFound {
            uri: uri.to_string(),
        });
    }

    let root = destination.join(Uuid::new_v4().to_string());
    let target = root.join(name);

    if source.is_file() {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &target)?;
        debug!(uri = %uri, path = %target.display(), "fetched probe file");
        return Ok(vec![FetchedFile {
            name: name.to_string(),
            local_path: target,
            root,
        }]);
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));
    for entry in walker {
        let entry = entry.map_err(|e| DoctorError::Fetch {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| DoctorError::Fetch {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let local_path = target.join(relative);
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &local_path)?;
        files.push(FetchedFile {
            name: format!("{}/{}", name, relative.display()),
            local_path,
            root: root.clone(),
        });
    }

    debug!(uri = %uri, files = files.len(), "fetched probe directory");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_single_file() {
        let src = tempfile::tempdir().unwrap();
        let stage = tempfile::tempdir().unwrap();
        let probe = src.path().join("passing.py");
        fs::write(&probe, "print('ok')\n").unwrap();

        let uri = ProbeUri::parse(&format!("file://{}", probe.display())).unwrap();
        let files = LocalFetcher.fetch(&uri, stage.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, uri.flattened_name());
        assert!(files[0].root.starts_with(stage.path()));
        assert!(files[0].local_path.starts_with(&files[0].root));
        assert!(files[0].local_path.exists());
    }

    #[test]
    fn test_fetch_directory_sorted_without_hidden() {
        let src = tempfile::tempdir().unwrap();
        let stage = tempfile::tempdir().unwrap();
        fs::write(src.path().join("b.py"), "").unwrap();
        fs::write(src.path().join("a.py"), "").unwrap();
        fs::write(src.path().join(".hidden.py"), "").unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();
        fs::write(src.path().join("nested/c.py"), "").unwrap();
        fs::create_dir(src.path().join(".git")).unwrap();
        fs::write(src.path().join(".git/hook.py"), "").unwrap();

        let uri = ProbeUri::parse(&src.path().display().to_string()).unwrap();
        let files = LocalFetcher.fetch(&uri, stage.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.name.rsplit_once('/').map(|(_, n)| n.to_string()).unwrap())
            .collect();

        assert_eq!(names, vec!["a.py", "b.py", "c.py"]);
        let flat = uri.flattened_name();
        assert_eq!(files[0].name, format!("{flat}/a.py"));
        assert_eq!(files[2].name, format!("{flat}/nested/c.py"));
        assert!(files.iter().all(|f| !f.local_path.to_string_lossy().contains(".git")));
    }

    #[test]
    fn test_sources_with_same_flattened_name_stay_separate() {
        let src = tempfile::tempdir().unwrap();
        let stage = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a_b.sh"), "exit 0\n").unwrap();
        fs::create_dir(src.path().join("a")).unwrap();
        fs::write(src.path().join("a/b.sh"), "exit 1\n").unwrap();

        let flat = ProbeUri::parse(&src.path().join("a_b.sh").display().to_string()).unwrap();
        let nested = ProbeUri::parse(&src.path().join("a/b.sh").display().to_string()).unwrap();
        assert_eq!(flat.flattened_name(), nested.flattened_name());

        let first = LocalFetcher.fetch(&flat, stage.path()).unwrap();
        let second = LocalFetcher.fetch(&nested, stage.path()).unwrap();

        assert_eq!(first[0].name, second[0].name);
        assert_ne!(first[0].local_path, second[0].local_path);
        assert_eq!(fs::read_to_string(&first[0].local_path).unwrap(), "exit 0\n");
        assert_eq!(fs::read_to_string(&second[0].local_path).unwrap(), "exit 1\n");
    }

    #[test]
    fn test_fetch_missing_source() {
        let stage = tempfile::tempdir().unwrap();
        let uri = ProbeUri::parse("file://does/not/exist.py").unwrap();
        let err = LocalFetcher.fetch(&uri, stage.path()).unwrap_err();
        assert!(matches!(err, DoctorError::SourceNotFound { .. }));
    }
}
