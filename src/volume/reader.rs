//! Component F: VolumeReader (spec §4.F). Locates a named tar member
//! across a volume sequence and reconstructs it, following splits the
//! matching [`super::writer::VolumeWriter`] produced.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::Error;

use super::{probe_extension, volume_path, BLOCK_SIZE};

enum Source {
    Plain(File),
    Gzip(GzDecoder<File>),
    Bzip2(BzDecoder<File>),
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Source::Plain(f) => f.read(buf),
            Source::Gzip(d) => d.read(buf),
            Source::Bzip2(d) => d.read(buf),
        }
    }
}

pub struct VolumeReader {
    repo: PathBuf,
    basename: String,
    ext: &'static str,
}

impl VolumeReader {
    /// Probes `{basename}.1.tar`, `.1.tar.gz`, `.1.tar.bz2` in that order
    /// to fix the extension for the whole sequence (spec §4.F).
    pub fn open(repo: &Path, basename: &str) -> Result<Self, Error> {
        let ext = probe_extension(repo, basename)?;
        Ok(VolumeReader { repo: repo.to_path_buf(), basename: basename.to_string(), ext })
    }

    fn open_volume(&self, ordinal: u32) -> Result<Option<Archive<Source>>, Error> {
        let path = volume_path(&self.repo, &self.basename, ordinal, self.ext);
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let source = match self.ext {
            "tar" => Source::Plain(file),
            "tar.gz" => Source::Gzip(GzDecoder::new(file)),
            "tar.bz2" => Source::Bzip2(BzDecoder::new(file)),
            _ => unreachable!("ext fixed at open() to one of the three known extensions"),
        };
        Ok(Some(Archive::new(source)))
    }

    /// Reconstruct the member named `tar_name` to `dest_path`, scanning
    /// forward from the first volume that contains it through consecutive
    /// volumes while the member keeps reappearing (spec §4.F algorithm).
    pub fn extract(&self, tar_name: &str, dest_path: &Path) -> Result<(), Error> {
        let mut ordinal = 1u32;
        let mut found_start = false;
        let mut dest: Option<File> = None;

        loop {
            let mut archive = match self.open_volume(ordinal)? {
                Some(a) => a,
                None => break,
            };

            let mut matched_this_volume = false;
            for entry in archive.entries().map_err(Error::tar)? {
                let mut entry = entry.map_err(Error::tar)?;
                let name = entry.path().map_err(Error::tar)?.to_string_lossy().into_owned();
                if name == tar_name {
                    found_start = true;
                    matched_this_volume = true;
                    let out = match dest.as_mut() {
                        Some(f) => f,
                        None => {
                            dest = Some(File::create(dest_path).map_err(|e| Error::io(dest_path, e))?);
                            dest.as_mut().unwrap()
                        }
                    };
                    stream_member(&mut entry, out, dest_path)?;
                    break;
                }
            }

            if !matched_this_volume && found_start {
                break;
            }
            ordinal += 1;
        }

        if !found_start {
            return Err(Error::NotFound(tar_name.to_string()));
        }
        Ok(())
    }
}

fn stream_member<R: Read>(entry: &mut R, dest: &mut File, dest_path: &Path) -> Result<(), Error> {
    let mut buf = vec![0u8; BLOCK_SIZE as usize];
    loop {
        let n = entry.read(&mut buf).map_err(Error::tar)?;
        if n == 0 {
            break;
        }
        dest.write_all(&buf[..n]).map_err(|e| Error::io(dest_path, e))?;
    }
    Ok(())
}
