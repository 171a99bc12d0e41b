//! Component D: CatalogueCodec (spec §4.D). Serializes and parses the
//! two-section textual catalogue (FileList then HashList) whose grammar is
//! given in spec §6. Parsing runs the explicit state machine spec §4.D
//! names, one state per grammar position — any unexpected token at any
//! state yields [`Error::CatalogueFormat`].

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::model::{FileInfo, FileList, HashList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitList,
    WaitDirFile,
    WaitPath,
    WaitMtime,
    WaitSize,
    WaitHash,
    WaitDirEnd,
    WaitFileEnd,
}

/// Serialize `filelist` then `hashlist` to `path`, each in sorted-key order
/// (free, since both are `BTreeMap`s). Scoped `File` handle — see
/// `SPEC_FULL.md` §C.1 on the source's unscoped-handle bug.
pub fn save(path: &Path, filelist: &FileList, hashlist: &HashList) -> Result<(), Error> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut w = BufWriter::new(file);
    write_filelist(&mut w, filelist).map_err(|e| Error::io(path, e))?;
    write_hashlist(&mut w, hashlist).map_err(|e| Error::io(path, e))?;
    w.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

fn write_filelist(w: &mut impl Write, filelist: &FileList) -> std::io::Result<()> {
    writeln!(w, "DIR_LIST")?;
    for (key, info) in filelist {
        if info.is_dir {
            writeln!(w, "DIR")?;
            writeln!(w, "{key}")?;
            writeln!(w, "{}", info.mtime)?;
            writeln!(w, "DIR_END")?;
        } else {
            writeln!(w, "FILE")?;
            writeln!(w, "{key}")?;
            writeln!(w, "{}", info.mtime)?;
            writeln!(w, "{}", info.size.unwrap_or(0))?;
            writeln!(w, "{}", info.hash.as_deref().unwrap_or(""))?;
            writeln!(w, "FILE_END")?;
        }
    }
    writeln!(w, "DIR_LIST_END")
}

fn write_hashlist(w: &mut impl Write, hashlist: &HashList) -> std::io::Result<()> {
    writeln!(w, "HASH_LIST")?;
    for (key, owner) in hashlist {
        writeln!(w, "HASH\t{key}\t{owner}")?;
    }
    writeln!(w, "HASH_LIST_END")
}

/// Parse a catalogue file into its (FileList, HashList) pair.
pub fn load(path: &Path) -> Result<(FileList, HashList), Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .map_err(|e| Error::io(path, e))?;

    let mut pos = 0usize;
    let mut next = || -> Result<&str, Error> {
        let line = lines
            .get(pos)
            .map(|s| s.trim_end())
            .ok_or_else(|| Error::CatalogueFormat("unexpected end of catalogue".into()))?;
        pos += 1;
        Ok(line)
    };

    let mut filelist = FileList::new();

    let tok = next()?;
    if tok != "DIR_LIST" {
        return Err(Error::CatalogueFormat(format!("expected DIR_LIST, got {tok:?}")));
    }

    let mut state = State::WaitDirFile;
    let mut cur_path = String::new();
    let mut cur_mtime: u64 = 0;
    let mut cur_size: u64 = 0;
    let mut cur_is_dir = false;

    loop {
        match state {
            State::WaitDirFile => {
                let tok = next()?;
                match tok {
                    "DIR" => {
                        cur_is_dir = true;
                        state = State::WaitPath;
                    }
                    "FILE" => {
                        cur_is_dir = false;
                        state = State::WaitPath;
                    }
                    "DIR_LIST_END" => break,
                    other => {
                        return Err(Error::CatalogueFormat(format!(
                            "expected DIR, FILE or DIR_LIST_END, got {other:?}"
                        )))
                    }
                }
            }
            State::WaitPath => {
                cur_path = next()?.to_string();
                state = State::WaitMtime;
            }
            State::WaitMtime => {
                let tok = next()?;
                cur_mtime = tok
                    .parse()
                    .map_err(|_| Error::CatalogueFormat(format!("bad mtime: {tok:?}")))?;
                state = if cur_is_dir { State::WaitDirEnd } else { State::WaitSize };
            }
            State::WaitSize => {
                let tok = next()?;
                cur_size = tok
                    .parse()
                    .map_err(|_| Error::CatalogueFormat(format!("bad size: {tok:?}")))?;
                state = State::WaitHash;
            }
            State::WaitHash => {
                let tok = next()?;
                filelist.insert(
                    cur_path.clone(),
                    FileInfo {
                        is_dir: false,
                        mtime: cur_mtime,
                        size: Some(cur_size),
                        hash: Some(tok.to_string()),
                        marked: false,
                    },
                );
                state = State::WaitFileEnd;
            }
            State::WaitDirEnd => {
                let tok = next()?;
                if tok != "DIR_END" {
                    return Err(Error::CatalogueFormat(format!("expected DIR_END, got {tok:?}")));
                }
                filelist.insert(cur_path.clone(), FileInfo::new_dir(cur_mtime));
                state = State::WaitDirFile;
            }
            State::WaitFileEnd => {
                let tok = next()?;
                if tok != "FILE_END" {
                    return Err(Error::CatalogueFormat(format!("expected FILE_END, got {tok:?}")));
                }
                state = State::WaitDirFile;
            }
            State::WaitList => unreachable!("consumed before entering the loop"),
        }
    }

    let marker = next()?;
    if marker != "HASH_LIST" {
        return Err(Error::CatalogueFormat(format!("expected HASH_LIST, got {marker:?}")));
    }

    let mut hashlist = HashList::new();
    loop {
        let tok = next()?;
        if tok == "HASH_LIST_END" {
            break;
        }
        let mut parts = tok.splitn(3, '\t');
        let tag = parts.next().unwrap_or("");
        if tag != "HASH" {
            return Err(Error::CatalogueFormat(format!("expected HASH row, got {tok:?}")));
        }
        let key = parts
            .next()
            .ok_or_else(|| Error::CatalogueFormat(format!("malformed HASH row: {tok:?}")))?;
        let owner = parts
            .next()
            .ok_or_else(|| Error::CatalogueFormat(format!("malformed HASH row: {tok:?}")))?;
        hashlist.insert(key.to_string(), owner.to_string());
    }

    Ok((filelist, hashlist))
}
