//! In-memory corpus for tests and embedding.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::{FileId, FileRecord};

use super::{Corpus, CorpusError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    files: BTreeMap<FileId, FileRecord>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, N, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let mut corpus = Self::new();
        for (name, content) in pairs {
            corpus.insert(FileRecord::from_text(name, content));
        }
        corpus
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.files.insert(record.id(), record);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Corpus for InMemoryCorpus {
    fn entries(&self) -> Result<Vec<FileId>, CorpusError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, id: &FileId) -> Result<FileRecord, CorpusError> {
        self.files
            .get(id)
            .cloned()
            .ok_or_else(|| CorpusError::NotFound {
                path: PathBuf::from(id.as_str()),
            })
    }

    fn describe(&self) -> String {
        format!("in-memory corpus ({} files)", self.files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_sorted_and_readable() {
        let corpus = InMemoryCorpus::from_pairs([("b", "2"), ("a", "1")]);
        let ids = corpus.entries().unwrap();
        assert_eq!(ids[0].as_str(), "a");
        assert_eq!(&*corpus.read(&ids[1]).unwrap().content, "2");
        assert!(corpus.read(&FileId::new("zzz")).is_err());
    }
}
