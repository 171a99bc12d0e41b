//! Component A: streaming SHA-256 of a file's bytes (spec §4.A).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Error;

/// Any power-of-two block size up to 64 KiB is correct per spec §4.A; 64 KiB
/// amortizes the syscall overhead well for the large files this tool expects
/// to spend most of its time on.
const BLOCK_SIZE: usize = 64 * 1024;

/// Hash a reader's full contents, returning (lowercase hex digest, byte
/// count actually read).
pub fn hash_reader<R: Read>(mut r: R) -> std::io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

/// Hash a file on disk. Fails with [`Error::Io`] on read error (spec §4.A).
pub fn hash_file(path: &Path) -> Result<(String, u64), Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    hash_reader(file).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn hashes_empty_input() {
        let (hash, size) = hash_reader(Cursor::new(Vec::<u8>::new())).unwrap();
        assert_eq!(size, 0);
        // SHA-256 of the empty string.
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hashes_known_vector() {
        let (hash, size) = hash_reader(Cursor::new(b"hello\n".to_vec())).unwrap();
        assert_eq!(size, 6);
        assert_eq!(
            hash,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn hashes_across_many_block_boundaries() {
        let data = vec![0x42u8; BLOCK_SIZE * 3 + 17];
        let (_, size) = hash_reader(Cursor::new(data.clone())).unwrap();
        assert_eq!(size, data.len() as u64);
    }

    #[test]
    fn missing_file_is_io_failure() {
        let err = hash_file(Path::new("/nonexistent/path/for/catback/tests")).unwrap_err();
        assert!(err.is_read_failure());
    }
}
