//! Corpus access: enumerate and read the files a run is evaluated over.
//!
//! A corpus is a pure I/O wrapper. It never interprets content; the batch
//! executor decides what to do with each [`FileRecord`].

mod fs;
mod memory;

use std::path::PathBuf;

use rand::seq::SliceRandom;
use rand::Rng;

pub use fs::FsCorpus;
pub use memory::InMemoryCorpus;

use crate::domain::{FileId, FileRecord};

/// Failure to reach or read the corpus. Fatal for the run that hit it.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus entry not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("unreadable corpus entry {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only access to a set of named text files.
///
/// Implementations must be shareable across worker threads; `read` is
/// called from blocking tasks.
pub trait Corpus: Send + Sync {
    /// All entry ids, sorted by name.
    fn entries(&self) -> Result<Vec<FileId>, CorpusError>;

    /// Snapshot one entry.
    fn read(&self, id: &FileId) -> Result<FileRecord, CorpusError>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;
}

/// Read up to `n` distinct files chosen uniformly at random. Used to build
/// generator prompts.
pub fn sample_files<R: Rng + ?Sized>(
    corpus: &dyn Corpus,
    n: usize,
    rng: &mut R,
) -> Result<Vec<FileRecord>, CorpusError> {
    let entries = corpus.entries()?;
    let mut picked: Vec<&FileId> = entries.choose_multiple(rng, n).collect();
    picked.sort();
    picked.into_iter().map(|id| corpus.read(id)).collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn corpus() -> InMemoryCorpus {
        InMemoryCorpus::from_pairs((1..=10).map(|i| (format!("{i}.txt"), format!("body {i}"))))
    }

    #[test]
    fn sample_is_bounded_and_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let sample = sample_files(&corpus(), 4, &mut rng).unwrap();
        assert_eq!(sample.len(), 4);
        let mut names: Vec<_> = sample.iter().map(|r| r.name.to_string()).collect();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn small_corpus_is_sampled_whole() {
        let mut rng = StdRng::seed_from_u64(7);
        let sample = sample_files(&corpus(), 50, &mut rng).unwrap();
        assert_eq!(sample.len(), 10);
    }

    #[test]
    fn same_seed_same_sample() {
        let a = sample_files(&corpus(), 3, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = sample_files(&corpus(), 3, &mut StdRng::seed_from_u64(1)).unwrap();
        let names = |v: &[FileRecord]| v.iter().map(|r| r.name.to_string()).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));
    }
}
