//! Volume naming and codec selection shared by [`writer`] (Component E)
//! and [`reader`] (Component F) (spec §6, §4.E, §4.F).

pub mod reader;
pub mod writer;

pub use reader::VolumeReader;
pub use writer::VolumeWriter;

use std::path::{Path, PathBuf};

use crate::error::Error;

/// Tar block size (spec §4.E: `B = BLOCKSIZE (512)`).
pub const BLOCK_SIZE: u64 = 512;
/// A tar record is 20 blocks; `max_part_size` is rounded down to a multiple
/// of this before use (spec §4.E).
pub const RECORD_SIZE: u64 = 20 * BLOCK_SIZE;

/// Compression codec for a volume set (spec §6 CLI surface: `-c {tar|gz|bz2}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    Gzip,
    Bzip2,
}

impl Codec {
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Plain => "tar",
            Codec::Gzip => "tar.gz",
            Codec::Bzip2 => "tar.bz2",
        }
    }

    /// Parse the `-c` CLI tag. A bad tag is a [`Error::Precondition`]
    /// (spec §7: "bad compression tag" is a precondition failure).
    pub fn parse(tag: &str) -> Result<Self, Error> {
        match tag {
            "tar" => Ok(Codec::Plain),
            "gz" => Ok(Codec::Gzip),
            "bz2" => Ok(Codec::Bzip2),
            other => Err(Error::Precondition(format!("unknown compression tag: {other:?}"))),
        }
    }
}

/// `{basename}.{n}.{ext}` (spec §6 volume naming).
pub fn volume_path(repo: &Path, basename: &str, ordinal: u32, ext: &str) -> PathBuf {
    repo.join(format!("{basename}.{ordinal}.{ext}"))
}

/// Probe `{basename}.1.tar`, `.1.tar.gz`, `.1.tar.bz2` in that order to fix
/// the volume set's extension (spec §4.F). Absence of all three is
/// [`Error::NotFound`].
pub fn probe_extension(repo: &Path, basename: &str) -> Result<&'static str, Error> {
    for ext in ["tar", "tar.gz", "tar.bz2"] {
        if volume_path(repo, basename, 1, ext).is_file() {
            return Ok(ext);
        }
    }
    Err(Error::NotFound(format!("no volume set named {basename:?} in {}", repo.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_parses_the_three_tags() {
        assert_eq!(Codec::parse("tar").unwrap().extension(), "tar");
        assert_eq!(Codec::parse("gz").unwrap().extension(), "tar.gz");
        assert_eq!(Codec::parse("bz2").unwrap().extension(), "tar.bz2");
        assert!(Codec::parse("zip").is_err());
    }

    #[test]
    fn probe_extension_prefers_plain_tar() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(volume_path(tmp.path(), "b", 1, "tar"), b"").unwrap();
        std::fs::write(volume_path(tmp.path(), "b", 1, "tar.gz"), b"").unwrap();
        assert_eq!(probe_extension(tmp.path(), "b").unwrap(), "tar");
    }

    #[test]
    fn probe_extension_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(probe_extension(tmp.path(), "nope").is_err());
    }
}
