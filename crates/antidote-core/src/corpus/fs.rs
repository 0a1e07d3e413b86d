//! Directory-backed corpus.

use std::io;
use std::path::{Path, PathBuf};

use crate::domain::{FileId, FileRecord};

use super::{Corpus, CorpusError};

/// A flat directory of text files. Subdirectories and other non-regular
/// entries are skipped; nothing is read recursively.
#[derive(Debug, Clone)]
pub struct FsCorpus {
    root: PathBuf,
}

impl FsCorpus {
    /// Open `root`, failing early if it is not a readable directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CorpusError> {
        let root = root.into();
        match std::fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => Ok(Self { root }),
            Ok(_) => Err(CorpusError::Unreadable {
                path: root,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CorpusError::NotFound { path: root })
            }
            Err(source) => Err(CorpusError::Unreadable { path: root, source }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn unreadable(path: &Path, source: io::Error) -> CorpusError {
    if source.kind() == io::ErrorKind::NotFound {
        CorpusError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        CorpusError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Corpus for FsCorpus {
    fn entries(&self) -> Result<Vec<FileId>, CorpusError> {
        let dir = std::fs::read_dir(&self.root).map_err(|e| unreadable(&self.root, e))?;
        let mut ids = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| unreadable(&self.root, e))?;
            let file_type = entry.file_type().map_err(|e| unreadable(&entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => ids.push(FileId(name)),
                Err(raw) => {
                    tracing::warn!(name = ?raw, "skipping corpus entry with non-UTF-8 name");
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read(&self, id: &FileId) -> Result<FileRecord, CorpusError> {
        let path = self.root.join(id.as_str());
        let bytes = std::fs::read(&path).map_err(|e| unreadable(&path, e))?;
        Ok(FileRecord::from_bytes(id.as_str(), &bytes))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_regular_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "c").unwrap();

        let corpus = FsCorpus::open(dir.path()).unwrap();
        let ids = corpus.entries().unwrap();
        assert_eq!(ids, vec![FileId::new("a.txt"), FileId::new("b.txt")]);
    }

    #[test]
    fn reads_invalid_utf8_lossily() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.bin"), [0x66, 0xfe, 0x67]).unwrap();
        let corpus = FsCorpus::open(dir.path()).unwrap();
        let rec = corpus.read(&FileId::new("x.bin")).unwrap();
        assert_eq!(rec.byte_length, 3);
        assert!(rec.content.contains('\u{FFFD}'));
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsCorpus::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CorpusError::NotFound { .. }));
    }

    #[test]
    fn file_removed_after_listing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gone.txt"), "x").unwrap();
        let corpus = FsCorpus::open(dir.path()).unwrap();
        let ids = corpus.entries().unwrap();
        std::fs::remove_file(dir.path().join("gone.txt")).unwrap();
        assert!(matches!(
            corpus.read(&ids[0]),
            Err(CorpusError::NotFound { .. })
        ));
    }
}
