use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::options::ScanOptions;

/// Fail before any processing if the scan root is unusable.
pub fn validate_root(path: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidRoot {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if !path.exists() {
        return Err(invalid("path does not exist"));
    }
    if !path.is_dir() {
        return Err(invalid("path is not a directory"));
    }
    Ok(())
}

/// Lazy, finite stream of media file paths under a root.
///
/// Entries are yielded in file-name order within each directory. Symlinks are
/// not followed and never yielded. Unreadable entries are logged and skipped.
pub struct MediaWalker {
    entries: walkdir::IntoIter,
    extensions: Vec<String>,
}

impl MediaWalker {
    pub fn new(options: &ScanOptions) -> Result<Self> {
        validate_root(&options.path)?;
        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let entries = WalkDir::new(&options.path)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter();
        Ok(Self {
            entries,
            extensions: options.extensions.iter().map(|e| e.to_lowercase()).collect(),
        })
    }

    fn is_media(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

impl Iterator for MediaWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_media(entry.path()) {
                return Some(entry.into_path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(walker: MediaWalker, root: &Path) -> Vec<String> {
        walker
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_flat_and_recursive() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("VID-20210101-WA0001.mp4"), b"v").unwrap();
        fs::write(root.join("IMG-20210101-WA0001.JPG"), b"i").unwrap();
        fs::write(root.join("notes.txt"), b"t").unwrap();
        fs::create_dir(root.join("Sent")).unwrap();
        fs::write(root.join("Sent").join("IMG-20210102-WA0001.jpg"), b"s").unwrap();

        let flat = MediaWalker::new(&ScanOptions::new(root)).unwrap();
        assert_eq!(
            names(flat, root),
            vec!["IMG-20210101-WA0001.JPG", "VID-20210101-WA0001.mp4"]
        );

        let deep = MediaWalker::new(&ScanOptions::new(root).with_recursive(true)).unwrap();
        assert_eq!(
            names(deep, root),
            vec![
                "IMG-20210101-WA0001.JPG",
                "Sent/IMG-20210102-WA0001.jpg",
                "VID-20210101-WA0001.mp4"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.jpg"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("a.jpg"), root.join("b.jpg")).unwrap();

        let walker = MediaWalker::new(&ScanOptions::new(root)).unwrap();
        assert_eq!(names(walker, root), vec!["a.jpg"]);
    }

    #[test]
    fn test_invalid_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            MediaWalker::new(&ScanOptions::new(dir.path().join("missing"))),
            Err(Error::InvalidRoot { .. })
        ));
        assert!(matches!(
            MediaWalker::new(&ScanOptions::new(&file)),
            Err(Error::InvalidRoot { .. })
        ));
    }
}
