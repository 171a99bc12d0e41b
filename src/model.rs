use std::collections::BTreeMap;
use std::fmt;

/// An ordered mapping from relative path (spec §3: a string beginning with
/// `/`) to [`FileInfo`]. `BTreeMap` gives lexicographic key order for free,
/// which is the canonical traversal order spec §3 and §5 require for
/// serialization, volume-ownership ordering, and byte-identical catalogues —
/// there is no separate "sort before serializing" step to forget.
pub type FileList = BTreeMap<String, FileInfo>;

/// A mapping from content key (`{hash}.{size}`) to the basename of the
/// backup that physically owns those bytes.
pub type HashList = BTreeMap<String, String>;

/// One entry in a [`FileList`] (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub mtime: u64,
    /// Present only for files that have been inspected on disk this run, or
    /// copied from a matching reference entry (spec invariant I3).
    pub size: Option<u64>,
    /// Lowercase hex SHA-256, 64 chars, same availability rule as `size`.
    pub hash: Option<String>,
    /// Transient, used only during `PatternFilter::include`/`include_hierarchy`
    /// passes (spec §3); never serialized.
    pub marked: bool,
}

impl FileInfo {
    pub fn new_dir(mtime: u64) -> Self {
        FileInfo { is_dir: true, mtime, size: None, hash: None, marked: false }
    }

    /// A file entry as produced by the walker, before it has been stat'd or
    /// hashed (spec §4.B: populated later, just-in-time).
    pub fn new_unpopulated_file() -> Self {
        FileInfo { is_dir: false, mtime: 0, size: None, hash: None, marked: false }
    }

    /// The content key for this entry (`{hash}.{size}`), if it has been
    /// fully inspected. `None` for directories and not-yet-inspected files.
    pub fn content_key(&self) -> Option<String> {
        match (&self.hash, self.size) {
            (Some(hash), Some(size)) if !self.is_dir => Some(format!("{hash}.{size}")),
            _ => None,
        }
    }
}

/// A parsed content key: `{hex-sha256}.{decimal-size}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKey {
    pub hash: String,
    pub size: u64,
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.hash, self.size)
    }
}

impl ContentKey {
    pub fn new(hash: impl Into<String>, size: u64) -> Self {
        ContentKey { hash: hash.into(), size }
    }

    /// Parse `{hash}.{size}`. The hash never contains a `.`, so splitting on
    /// the last one is unambiguous.
    pub fn parse(s: &str) -> Option<Self> {
        let pos = s.rfind('.')?;
        let (hash, size_str) = (&s[..pos], &s[pos + 1..]);
        let size: u64 = size_str.parse().ok()?;
        if hash.is_empty() {
            return None;
        }
        Some(ContentKey { hash: hash.to_string(), size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_round_trip() {
        let k = ContentKey::new("abcd", 42);
        assert_eq!(k.to_string(), "abcd.42");
        assert_eq!(ContentKey::parse("abcd.42"), Some(k));
    }

    #[test]
    fn content_key_rejects_garbage() {
        assert_eq!(ContentKey::parse("no-dot-here"), None);
        assert_eq!(ContentKey::parse("abcd.notanumber"), None);
    }

    #[test]
    fn file_info_content_key_requires_hash_and_size() {
        let mut info = FileInfo::new_unpopulated_file();
        assert_eq!(info.content_key(), None);
        info.hash = Some("a".repeat(64));
        assert_eq!(info.content_key(), None);
        info.size = Some(10);
        assert!(info.content_key().is_some());
    }

    #[test]
    fn dir_never_has_content_key() {
        let mut info = FileInfo::new_dir(0);
        info.hash = Some("a".repeat(64));
        info.size = Some(10);
        assert_eq!(info.content_key(), None);
    }
}
