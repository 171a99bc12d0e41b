//! Component B: PathWalker (spec §4.B). Recursively enumerates a source
//! directory into a [`FileList`]. File entries are left unpopulated —
//! `mtime`/`size`/`hash` are read later, immediately before the file is
//! hashed or archived, to narrow the race window between enumeration and
//! capture.

use std::fs::{self, Metadata};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::Error;
use crate::model::{FileInfo, FileList};

/// Enumerate `root`, producing a [`FileList`] keyed by `/seg1/seg2/…/name`.
/// The root itself is never recorded. Entry kinds other than directory and
/// regular file (symlinks, sockets, devices, …) are skipped silently.
pub fn walk(root: &Path) -> Result<FileList, Error> {
    let mut filelist = FileList::new();
    walk_dir(root, "", &mut filelist)?;
    Ok(filelist)
}

fn walk_dir(root: &Path, rel: &str, filelist: &mut FileList) -> Result<(), Error> {
    let dir_path = join_rel(root, rel);
    let entries = fs::read_dir(&dir_path).map_err(|e| Error::io(&dir_path, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&dir_path, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = format!("{rel}/{name}");

        if file_type.is_dir() {
            let meta = entry.metadata().map_err(|e| Error::io(entry.path(), e))?;
            filelist.insert(key.clone(), FileInfo::new_dir(mtime_secs(&meta)));
            walk_dir(root, &key, filelist)?;
        } else if file_type.is_file() {
            filelist.insert(key, FileInfo::new_unpopulated_file());
        }
        // Other entry kinds (symlinks, fifos, sockets, …) are skipped silently.
    }
    Ok(())
}

fn join_rel(root: &Path, rel: &str) -> std::path::PathBuf {
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel.trim_start_matches('/'))
    }
}

/// Truncate a file's mtime to whole seconds (spec §3: "integer seconds
/// (truncated)").
pub fn mtime_secs(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self as stdfs, File};

    #[test]
    fn empty_directory_yields_empty_filelist() {
        let tmp = tempfile::tempdir().unwrap();
        let filelist = walk(tmp.path()).unwrap();
        assert!(filelist.is_empty());
    }

    #[test]
    fn flat_files_are_enumerated_unpopulated() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("a.txt")).unwrap();
        File::create(tmp.path().join("b.txt")).unwrap();

        let filelist = walk(tmp.path()).unwrap();
        assert_eq!(filelist.len(), 2);
        let a = &filelist["/a.txt"];
        assert!(!a.is_dir);
        assert_eq!(a.size, None);
        assert_eq!(a.hash, None);
    }

    #[test]
    fn nested_directories_get_dir_entries() {
        let tmp = tempfile::tempdir().unwrap();
        stdfs::create_dir_all(tmp.path().join("dir/sub")).unwrap();
        File::create(tmp.path().join("dir/sub/c.txt")).unwrap();

        let filelist = walk(tmp.path()).unwrap();
        assert!(filelist["/dir"].is_dir);
        assert!(filelist["/dir/sub"].is_dir);
        assert!(!filelist["/dir/sub/c.txt"].is_dir);
    }

    #[test]
    fn keys_always_start_with_slash() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("x")).unwrap();
        let filelist = walk(tmp.path()).unwrap();
        assert!(filelist.keys().all(|k| k.starts_with('/')));
    }
}
