//! Component G: BackupEngine (spec §4.G, `create`). Enumerates the source
//! tree, matches it against an optional reference catalogue, hashes as
//! needed, dedupes against the running HashList, and streams new content
//! into a [`VolumeWriter`].

use std::path::{Path, PathBuf};

use crate::catalogue;
use crate::error::Error;
use crate::filter;
use crate::hasher;
use crate::model::{ContentKey, FileList, HashList};
use crate::policy::{ErrorPolicy, Resolution, WriteResolution};
use crate::report::{BackupEvent, Reporter};
use crate::volume::{Codec, VolumeWriter};
use crate::walker;

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub source: PathBuf,
    pub repo: PathBuf,
    pub name: String,
    pub reference: Option<String>,
    pub max_part_size: u64,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub codec: Codec,
    /// `-a`: force hash recomputation, bypassing the reference
    /// `(mtime, size)` short-circuit entirely (spec §4.G step 5, §9).
    pub recalculate: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreateReport {
    pub added: usize,
    pub deduped: usize,
    pub reused: usize,
    pub ignored: usize,
}

enum Outcome {
    Added { mtime: u64, size: u64, hash: String },
    Deduped { mtime: u64, size: u64, hash: String },
    Reused { mtime: u64, size: u64, hash: String },
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

/// Run `create` (spec §4.G). Preconditions: `source` is a directory,
/// `repo` is a directory, no catalogue named `opts.name` already exists
/// there (spec §7: all three are precondition failures, fast, no side
/// effects).
pub fn create(
    opts: &CreateOptions,
    policy: &mut dyn ErrorPolicy,
    reporter: &mut dyn Reporter,
) -> Result<CreateReport, Error> {
    if !opts.source.is_dir() {
        return Err(Error::Precondition(format!("source {:?} is not a directory", opts.source)));
    }
    if !opts.repo.is_dir() {
        return Err(Error::Precondition(format!("repository {:?} is not a directory", opts.repo)));
    }
    let cat_path = opts.repo.join(format!("{}.cat", opts.name));
    if cat_path.exists() {
        return Err(Error::Precondition(format!(
            "a catalogue named {:?} already exists in {:?}",
            opts.name, opts.repo
        )));
    }

    let mut filelist = walker::walk(&opts.source)?;
    filter::include_hierarchy(&mut filelist, &opts.include)?;
    filter::exclude(&mut filelist, &opts.exclude)?;

    let (ref_filelist, mut hashlist): (FileList, HashList) = match &opts.reference {
        Some(ref_name) => catalogue::load(&opts.repo.join(format!("{ref_name}.cat")))?,
        None => (FileList::new(), HashList::new()),
    };

    let mut writer = VolumeWriter::new(&opts.repo, &opts.name, opts.codec, opts.max_part_size);
    let mut report = CreateReport::default();
    let mut to_remove: Vec<String> = Vec::new();

    let keys: Vec<String> = filelist.keys().cloned().collect();

    for key in keys {
        let is_dir = filelist.get(&key).map(|i| i.is_dir).unwrap_or(true);
        if is_dir {
            continue;
        }
        let file_path = source_path(&opts.source, &key);

        let outcome: Option<Outcome> = 'retry: loop {
            let step_result: Result<Outcome, StepError> = (|| {
                let meta =
                    std::fs::metadata(&file_path).map_err(|e| StepError::read(Error::io(&file_path, e)))?;
                let mtime = walker::mtime_secs(&meta);
                let size = meta.len();

                let reference_match = !opts.recalculate
                    && ref_filelist.get(&key).is_some_and(|r| {
                        !r.is_dir && r.mtime == mtime && r.size == Some(size) && r.hash.is_some()
                    });

                if reference_match {
                    let hash = ref_filelist[&key].hash.clone().expect("checked above");
                    return Ok(Outcome::Reused { mtime, size, hash });
                }

                let (hash, hashed_size) = hasher::hash_file(&file_path).map_err(StepError::read)?;
                let content_key = ContentKey::new(hash.clone(), hashed_size).to_string();

                if hashlist.contains_key(&content_key) {
                    Ok(Outcome::Deduped { mtime, size: hashed_size, hash })
                } else {
                    writer.add(&file_path, &content_key).map_err(StepError::write)?;
                    Ok(Outcome::Added { mtime, size: hashed_size, hash })
                }
            })();

            match step_result {
                Ok(outcome) => break 'retry Some(outcome),
                Err(step_err) => {
                    let resolution = match step_err.stage {
                        Stage::Read => policy.on_read_error(&file_path, &step_err.error),
                        Stage::Write => match policy.on_write_error(&file_path, &step_err.error) {
                            WriteResolution::Cancel => Resolution::Cancel,
                            WriteResolution::Retry => Resolution::Retry,
                        },
                    };
                    match resolution {
                        Resolution::Retry => continue 'retry,
                        Resolution::Ignore => break 'retry None,
                        Resolution::Cancel => {
                            writer.close()?;
                            return Err(Error::Cancelled);
                        }
                    }
                }
            }
        };

        match outcome {
            Some(Outcome::Reused { mtime, size, hash }) => {
                let content_key = ContentKey::new(hash.clone(), size).to_string();
                let owner = hashlist
                    .get(&content_key)
                    .cloned()
                    .unwrap_or_else(|| opts.reference.clone().unwrap_or_else(|| opts.name.clone()));
                let info = filelist.get_mut(&key).expect("key enumerated from this filelist");
                info.mtime = mtime;
                info.size = Some(size);
                info.hash = Some(hash);
                reporter.on_event(BackupEvent::Reused { path: key.clone(), key: content_key, from: owner });
                report.reused += 1;
            }
            Some(Outcome::Deduped { mtime, size, hash }) => {
                let content_key = ContentKey::new(hash.clone(), size).to_string();
                let info = filelist.get_mut(&key).expect("key enumerated from this filelist");
                info.mtime = mtime;
                info.size = Some(size);
                info.hash = Some(hash);
                reporter.on_event(BackupEvent::Deduped { path: key.clone(), key: content_key });
                report.deduped += 1;
            }
            Some(Outcome::Added { mtime, size, hash }) => {
                let content_key = ContentKey::new(hash.clone(), size).to_string();
                hashlist.entry(content_key.clone()).or_insert_with(|| opts.name.clone());
                let info = filelist.get_mut(&key).expect("key enumerated from this filelist");
                info.mtime = mtime;
                info.size = Some(size);
                info.hash = Some(hash);
                reporter.on_event(BackupEvent::Added { path: key.clone(), key: content_key });
                report.added += 1;
            }
            None => {
                reporter.on_event(BackupEvent::ReadIgnored { path: key.clone() });
                report.ignored += 1;
                to_remove.push(key);
            }
        }
    }

    for key in to_remove {
        filelist.remove(&key);
    }

    writer.close()?;
    catalogue::save(&cat_path, &filelist, &hashlist)?;

    Ok(report)
}

fn source_path(root: &Path, key: &str) -> PathBuf {
    root.join(key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScriptedPolicy;
    use crate::report::NullReporter;
    use std::fs;

    fn base_opts(source: &Path, repo: &Path, name: &str) -> CreateOptions {
        CreateOptions {
            source: source.to_path_buf(),
            repo: repo.to_path_buf(),
            name: name.to_string(),
            reference: None,
            max_part_size: 10 * 1024 * 1024,
            include: vec![],
            exclude: vec![],
            codec: Codec::Plain,
            recalculate: false,
        }
    }

    #[test]
    fn empty_source_produces_no_volume() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let opts = base_opts(src.path(), repo.path(), "e");
        let mut policy = ScriptedPolicy { reads: vec![], writes: vec![] };
        let report = create(&opts, &mut policy, &mut NullReporter).unwrap();
        assert_eq!(report, CreateReport::default());
        assert!(repo.path().join("e.cat").is_file());
        assert!(!repo.path().join("e.1.tar").exists());
    }

    #[test]
    fn dedup_within_one_tree_produces_one_member() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"x").unwrap();
        fs::create_dir(src.path().join("dir")).unwrap();
        fs::write(src.path().join("dir/b.txt"), b"x").unwrap();

        let opts = base_opts(src.path(), repo.path(), "dd");
        let mut policy = ScriptedPolicy { reads: vec![], writes: vec![] };
        let report = create(&opts, &mut policy, &mut NullReporter).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.deduped, 1);

        let (filelist, hashlist) = catalogue::load(&repo.path().join("dd.cat")).unwrap();
        assert_eq!(hashlist.len(), 1);
        let key_a = filelist["/a.txt"].content_key().unwrap();
        let key_b = filelist["/dir/b.txt"].content_key().unwrap();
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn precondition_rejects_duplicate_basename() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        fs::write(repo.path().join("dup.cat"), b"DIR_LIST\nDIR_LIST_END\nHASH_LIST\nHASH_LIST_END\n").unwrap();
        let opts = base_opts(src.path(), repo.path(), "dup");
        let mut policy = ScriptedPolicy { reads: vec![], writes: vec![] };
        let err = create(&opts, &mut policy, &mut NullReporter).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn differential_backup_reuses_unchanged_content() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a"), b"aaa").unwrap();
        fs::write(src.path().join("b"), b"bbb").unwrap();

        let opts_a = base_opts(src.path(), repo.path(), "A");
        let mut policy = ScriptedPolicy { reads: vec![], writes: vec![] };
        create(&opts_a, &mut policy, &mut NullReporter).unwrap();

        // mutate /b's mtime and content
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(src.path().join("b"), b"changed").unwrap();
        filetime::set_file_mtime(
            src.path().join("b"),
            filetime::FileTime::from_unix_time(9_999_999_999, 0),
        )
        .unwrap();

        let mut opts_b = base_opts(src.path(), repo.path(), "B");
        opts_b.reference = Some("A".to_string());
        let mut policy = ScriptedPolicy { reads: vec![], writes: vec![] };
        let report = create(&opts_b, &mut policy, &mut NullReporter).unwrap();

        assert_eq!(report.reused, 1, "unchanged /a should be reused from A");
        assert_eq!(report.added, 1, "changed /b should be re-added under B");

        let (_, hashlist_b) = catalogue::load(&repo.path().join("B.cat")).unwrap();
        let (filelist_a, _) = catalogue::load(&repo.path().join("A.cat")).unwrap();
        let key_a = filelist_a["/a"].content_key().unwrap();
        assert_eq!(hashlist_b.get(&key_a), Some(&"A".to_string()));
    }

    #[test]
    #[cfg(unix)]
    fn ignore_policy_drops_unreadable_entries() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"ok").unwrap();
        let locked = src.path().join("locked.txt");
        fs::write(&locked, b"nope").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let opts = base_opts(src.path(), repo.path(), "ig");
        let mut policy = ScriptedPolicy { reads: vec![crate::policy::Resolution::Ignore], writes: vec![] };
        let report = create(&opts, &mut policy, &mut NullReporter).unwrap();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.ignored, 1);
        let (filelist, _) = catalogue::load(&repo.path().join("ig.cat")).unwrap();
        assert!(!filelist.contains_key("/locked.txt"));
    }
}
