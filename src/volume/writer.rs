//! Component E: VolumeWriter (spec §4.E). Streams files into a sequence of
//! size-bounded tar volumes, splitting a single file's payload across
//! volumes when it doesn't fit in the space remaining in the current one.
//! This is a deliberate non-standard extension of tar (spec §4.E
//! Rationale): a split file becomes several tar members sharing one name,
//! readable only by the matching [`super::reader::VolumeReader`].

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use bzip2::Compression as BzCompression;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use tar::{Builder, Header};

use crate::error::Error;

use super::{volume_path, Codec, BLOCK_SIZE, RECORD_SIZE};

enum Sink {
    Plain(File),
    Gzip(GzEncoder<File>),
    Bzip2(BzEncoder<File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Plain(f) => f.write(buf),
            Sink::Gzip(e) => e.write(buf),
            Sink::Bzip2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(f) => f.flush(),
            Sink::Gzip(e) => e.flush(),
            Sink::Bzip2(e) => e.flush(),
        }
    }
}

impl Sink {
    fn finish(self) -> std::io::Result<()> {
        match self {
            Sink::Plain(mut f) => f.flush(),
            Sink::Gzip(e) => e.finish().map(|_| ()),
            Sink::Bzip2(e) => e.finish().map(|_| ()),
        }
    }
}

pub struct VolumeWriter {
    repo: PathBuf,
    basename: String,
    codec: Codec,
    max_part_size: u64,
    ordinal: u32,
    builder: Option<Builder<Sink>>,
    part_size: u64,
}

impl VolumeWriter {
    /// `max_part_size` is rounded *down* to a multiple of the tar record
    /// size (spec §4.E). No volume is opened yet — opening is lazy, on the
    /// first [`VolumeWriter::add`] (spec scenario 1: an empty source never
    /// produces a `.1.*` volume).
    pub fn new(repo: &Path, basename: &str, codec: Codec, max_part_size: u64) -> Self {
        let rounded = (max_part_size / RECORD_SIZE).max(1) * RECORD_SIZE;
        VolumeWriter {
            repo: repo.to_path_buf(),
            basename: basename.to_string(),
            codec,
            max_part_size: rounded,
            ordinal: 0,
            builder: None,
            part_size: 0,
        }
    }

    fn open_next_volume(&mut self) -> Result<(), Error> {
        self.close_current()?;
        self.ordinal += 1;
        let path = volume_path(&self.repo, &self.basename, self.ordinal, self.codec.extension());
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let sink = match self.codec {
            Codec::Plain => Sink::Plain(file),
            Codec::Gzip => Sink::Gzip(GzEncoder::new(file, GzCompression::default())),
            Codec::Bzip2 => Sink::Bzip2(BzEncoder::new(file, BzCompression::default())),
        };
        self.builder = Some(Builder::new(sink));
        self.part_size = 0;
        Ok(())
    }

    fn close_current(&mut self) -> Result<(), Error> {
        if let Some(builder) = self.builder.take() {
            let sink = builder.into_inner().map_err(Error::tar)?;
            sink.finish().map_err(Error::tar)?;
        }
        Ok(())
    }

    /// Stream `file_path`'s bytes into the volume sequence under tar member
    /// name `tar_name` (a content key, per spec §3), splitting across
    /// volume boundaries per the algorithm in spec §4.E.
    pub fn add(&mut self, file_path: &Path, tar_name: &str) -> Result<(), Error> {
        if self.builder.is_none() {
            self.open_next_volume()?;
        }

        let mut source = File::open(file_path).map_err(|e| Error::io(file_path, e))?;
        let mut file_size = source.metadata().map_err(|e| Error::io(file_path, e))?.len();
        let b = BLOCK_SIZE;

        while self.part_size + file_size + 3 * b > self.max_part_size {
            let chunk = self.max_part_size - self.part_size - 3 * b;
            self.append_member(tar_name, chunk, (&mut source).take(chunk))?;
            self.part_size += b + chunk;
            debug_assert_eq!(self.part_size + 2 * b, self.max_part_size);
            self.open_next_volume()?;
            file_size -= chunk;
        }

        self.append_member(tar_name, file_size, &mut source)?;
        let padded = (file_size + b - 1) / b * b;
        self.part_size += b + padded;

        debug_assert!(self.part_size + 2 * b <= self.max_part_size);
        if self.part_size + 3 * b >= self.max_part_size {
            self.close_current()?;
        }
        Ok(())
    }

    fn append_member<R: Read>(&mut self, tar_name: &str, size: u64, data: R) -> Result<(), Error> {
        let mut header = Header::new_ustar();
        header.set_path(tar_name).map_err(Error::tar)?;
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        let builder = self.builder.as_mut().expect("volume is open before appending");
        builder.append(&header, data).map_err(Error::tar)
    }

    /// Flush the currently open volume, if any. A no-op if nothing was
    /// ever added.
    pub fn close(&mut self) -> Result<(), Error> {
        self.close_current()
    }

    pub fn volume_count(&self) -> u32 {
        self.ordinal
    }
}
