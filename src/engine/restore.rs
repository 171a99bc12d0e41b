//! Component H: RestoreEngine (spec §4.H, `restore`). Loads a catalogue,
//! filters it, materializes the destination tree, extracts missing or
//! changed files (skipping ones already identical on disk), and
//! optionally deletes destination entries the filtered catalogue no
//! longer names.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::{set_file_times, FileTime};

use crate::catalogue;
use crate::error::Error;
use crate::filter;
use crate::hasher;
use crate::model::{FileInfo, FileList};
use crate::policy::{ErrorPolicy, Resolution, WriteResolution};
use crate::report::{BackupEvent, Reporter};
use crate::volume::VolumeReader;
use crate::walker;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub repo: PathBuf,
    pub name: String,
    pub destination: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub delete: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub extracted: usize,
    pub skipped_identical: usize,
    pub deleted: usize,
}

enum StepOutcome {
    DirCreated,
    Extracted,
    SkippedIdentical,
}

enum Stage {
    Read,
    Write,
}

struct StepError {
    stage: Stage,
    error: Error,
}

impl StepError {
    fn read(error: Error) -> Self {
        StepError { stage: Stage::Read, error }
    }
    fn write(error: Error) -> Self {
        StepError { stage: Stage::Write, error }
    }
}

/// Run `restore` (spec §4.H). Preconditions: repository, catalogue, and
/// destination directory all exist.
pub fn restore(
    opts: &RestoreOptions,
    policy: &mut dyn ErrorPolicy,
    reporter: &mut dyn Reporter,
) -> Result<RestoreReport, Error> {
    if !opts.repo.is_dir() {
        return Err(Error::Precondition(format!("repository {:?} is not a directory", opts.repo)));
    }
    let cat_path = opts.repo.join(format!("{}.cat", opts.name));
    if !cat_path.is_file() {
        return Err(Error::Precondition(format!("no catalogue named {:?} in {:?}", opts.name, opts.repo)));
    }
    if !opts.destination.is_dir() {
        return Err(Error::Precondition(format!(
            "destination {:?} is not a directory",
            opts.destination
        )));
    }

    let (mut filelist, hashlist) = catalogue::load(&cat_path)?;
    filter::fix_hierarchy(&mut filelist);
    filter::include_hierarchy(&mut filelist, &opts.include)?;
    filter::exclude(&mut filelist, &opts.exclude)?;

    let mut report = RestoreReport::default();
    let keys: Vec<String> = filelist.keys().cloned().collect();

    for key in &keys {
        let info = filelist[key].clone();
        let dest_path = dest_for(&opts.destination, key);

        'retry: loop {
            let step: Result<StepOutcome, StepError> = (|| {
                let file_dir = if info.is_dir {
                    dest_path.clone()
                } else {
                    dest_path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| opts.destination.clone())
                };

                if file_dir.is_file() {
                    fs::remove_file(&file_dir).map_err(|e| StepError::read(Error::io(&file_dir, e)))?;
                }
                fs::create_dir_all(&file_dir).map_err(|e| StepError::read(Error::io(&file_dir, e)))?;

                if info.is_dir {
                    set_mtime(&dest_path, info.mtime);
                    return Ok(StepOutcome::DirCreated);
                }

                let content_key =
                    info.content_key().ok_or_else(|| StepError::read(Error::HashName(key.clone())))?;

                if identical_on_disk(&dest_path, &info) {
                    return Ok(StepOutcome::SkippedIdentical);
                }

                if dest_path.is_dir() {
                    fs::remove_dir_all(&dest_path).map_err(|e| StepError::read(Error::io(&dest_path, e)))?;
                }

                let owner = hashlist
                    .get(&content_key)
                    .ok_or_else(|| StepError::read(Error::NotFound(content_key.clone())))?;
                let reader = VolumeReader::open(&opts.repo, owner).map_err(StepError::read)?;
                reader.extract(&content_key, &dest_path).map_err(StepError::write)?;

                set_mtime(&dest_path, info.mtime);
                Ok(StepOutcome::Extracted)
            })();

            match step {
                Ok(StepOutcome::DirCreated) => {
                    reporter.on_event(BackupEvent::DirCreated { path: dest_path.clone() });
                    break 'retry;
                }
                Ok(StepOutcome::Extracted) => {
                    reporter.on_event(BackupEvent::Extracted { path: key.clone() });
                    report.extracted += 1;
                    break 'retry;
                }
                Ok(StepOutcome::SkippedIdentical) => {
                    reporter.on_event(BackupEvent::SkippedIdentical { path: key.clone() });
                    report.skipped_identical += 1;
                    break 'retry;
                }
                Err(step_err) => {
                    let resolution = match step_err.stage {
                        Stage::Read => policy.on_read_error(&dest_path, &step_err.error),
                        Stage::Write => match policy.on_write_error(&dest_path, &step_err.error) {
                            WriteResolution::Cancel => Resolution::Cancel,
                            WriteResolution::Retry => Resolution::Retry,
                        },
                    };
                    match resolution {
                        Resolution::Retry => continue 'retry,
                        Resolution::Ignore => break 'retry,
                        Resolution::Cancel => return Err(Error::Cancelled),
                    }
                }
            }
        }
    }

    if opts.delete {
        report.deleted += delete_extras(&opts.destination, &filelist, reporter)?;
    }

    Ok(report)
}

fn dest_for(destination: &Path, key: &str) -> PathBuf {
    destination.join(key.trim_start_matches('/'))
}

fn set_mtime(path: &Path, mtime: u64) {
    let ft = FileTime::from_unix_time(mtime as i64, 0);
    let _ = set_file_times(path, ft, ft);
}

/// Skip-if-identical check (spec §4.H step 3, testable property "Idempotent
/// restore"): `mtime`, `size`, and a fresh hash must all match.
fn identical_on_disk(path: &Path, info: &FileInfo) -> bool {
    let meta = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return false,
    };
    if walker::mtime_secs(&meta) != info.mtime || Some(meta.len()) != info.size {
        return false;
    }
    match hasher::hash_file(path) {
        Ok((hash, _)) => Some(hash) == info.hash,
        Err(_) => false,
    }
}

/// spec §4.H step 4: remove files not in the filtered FileList, then
/// directories not in it — two passes so every directory is empty by the
/// time its removal is attempted.
fn delete_extras(destination: &Path, filelist: &FileList, reporter: &mut dyn Reporter) -> Result<usize, Error> {
    let mut present_files: HashSet<PathBuf> = HashSet::new();
    let mut present_dirs: HashSet<PathBuf> = HashSet::new();
    for (key, info) in filelist {
        if info.is_dir {
            present_dirs.insert(dest_for(destination, key));
        } else {
            present_files.insert(dest_for(destination, key));
        }
    }

    let mut all_files = Vec::new();
    let mut all_dirs = Vec::new();
    collect_tree(destination, &mut all_files, &mut all_dirs)?;

    let mut count = 0usize;
    for path in &all_files {
        if !present_files.contains(path) {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
            reporter.on_event(BackupEvent::Deleted { path: path.clone() });
            count += 1;
        }
    }
    for path in all_dirs.iter().rev() {
        if path == destination || present_dirs.contains(path) {
            continue;
        }
        if fs::remove_dir(path).is_ok() {
            reporter.on_event(BackupEvent::Deleted { path: path.clone() });
            count += 1;
        }
    }
    Ok(count)
}

fn collect_tree(root: &Path, files: &mut Vec<PathBuf>, dirs: &mut Vec<PathBuf>) -> Result<(), Error> {
    dirs.push(root.to_path_buf());
    for entry in fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
        if file_type.is_dir() {
            collect_tree(&path, files, dirs)?;
        } else if file_type.is_file() {
            files.push(path);
        }
    }
    Ok(())
}
