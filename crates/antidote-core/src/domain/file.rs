//! Corpus file identity and read-only content snapshots.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identifier of a corpus entry: its file name relative to the
/// dataset root. Ground-truth labels are keyed by the same value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Read-only snapshot of one corpus entry.
///
/// `name` and `content` are reference counted so a record can be handed to
/// a worker thread without copying the payload.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub name: Arc<str>,
    pub content: Arc<str>,
    /// Size of the raw bytes on disk, before lossy UTF-8 decoding.
    pub byte_length: u64,
}

impl FileRecord {
    /// Build a record from raw bytes. Invalid UTF-8 sequences are replaced,
    /// never rejected: untrusted corpora routinely contain them.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        let content = String::from_utf8_lossy(bytes);
        Self {
            name: Arc::from(name.into()),
            content: Arc::from(content.as_ref()),
            byte_length: bytes.len() as u64,
        }
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text: String = text.into();
        let byte_length = text.len() as u64;
        Self {
            name: Arc::from(name.into()),
            content: Arc::from(text),
            byte_length,
        }
    }

    pub fn id(&self) -> FileId {
        FileId(self.name.to_string())
    }

    /// First `max_chars` characters of the content, with a `...` marker
    /// when truncated. Used for prompt excerpts.
    pub fn excerpt(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.content[..cut]),
            None => self.content.to_string(),
        }
    }
}
