//! Component I: FindEngine (spec §4.I, `find`). Lists catalogues whose
//! basename matches a glob, loads each, applies non-hierarchical
//! include/exclude, and reports every surviving key.

use std::path::PathBuf;

use glob::Pattern;

use crate::catalogue;
use crate::error::Error;
use crate::filter;

#[derive(Debug, Clone)]
pub struct FindOptions {
    pub repo: PathBuf,
    pub name_pattern: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Returns `"{cat_basename}: {key}"` for every surviving key, grouped by
/// catalogue (catalogues in sorted-basename order, keys in sorted order
/// within each, matching the `FileList`'s own canonical order).
pub fn find(opts: &FindOptions) -> Result<Vec<String>, Error> {
    let matcher = Pattern::new(&format!("{}.cat", opts.name_pattern))?;

    let mut basenames: Vec<String> = std::fs::read_dir(&opts.repo)
        .map_err(|e| Error::io(&opts.repo, e))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".cat") && matcher.matches(&name) {
                Some(name[..name.len() - ".cat".len()].to_string())
            } else {
                None
            }
        })
        .collect();
    basenames.sort();

    let mut lines = Vec::new();
    for basename in basenames {
        let (mut filelist, _hashlist) = catalogue::load(&opts.repo.join(format!("{basename}.cat")))?;
        filter::include(&mut filelist, &opts.include)?;
        filter::exclude(&mut filelist, &opts.exclude)?;
        for key in filelist.keys() {
            lines.push(format!("{basename}: {key}"));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backup::{create, CreateOptions};
    use crate::policy::ScriptedPolicy;
    use crate::report::NullReporter;
    use crate::volume::Codec;
    use std::fs;

    fn do_create(source: &std::path::Path, repo: &std::path::Path, name: &str) {
        let opts = CreateOptions {
            source: source.to_path_buf(),
            repo: repo.to_path_buf(),
            name: name.to_string(),
            reference: None,
            max_part_size: 10 * 1024 * 1024,
            include: vec![],
            exclude: vec![],
            codec: Codec::Plain,
            recalculate: false,
        };
        let mut policy = ScriptedPolicy { reads: vec![], writes: vec![] };
        create(&opts, &mut policy, &mut NullReporter).unwrap();
    }

    #[test]
    fn finds_across_matching_catalogues_only() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"x").unwrap();

        do_create(src.path(), repo.path(), "monday");
        do_create(src.path(), repo.path(), "tuesday");
        do_create(src.path(), repo.path(), "other");

        let opts = FindOptions {
            repo: repo.path().to_path_buf(),
            name_pattern: "*day".to_string(),
            include: vec![],
            exclude: vec![],
        };
        let lines = find(&opts).unwrap();
        assert!(lines.iter().all(|l| l.starts_with("monday:") || l.starts_with("tuesday:")));
        assert!(lines.iter().any(|l| l.starts_with("monday:")));
        assert!(lines.iter().any(|l| l.starts_with("tuesday:")));
    }

    #[test]
    fn applies_include_and_exclude() {
        let src = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"x").unwrap();
        fs::write(src.path().join("b.log"), b"y").unwrap();

        do_create(src.path(), repo.path(), "b1");

        let opts = FindOptions {
            repo: repo.path().to_path_buf(),
            name_pattern: "b1".to_string(),
            include: vec!["/*.txt".to_string()],
            exclude: vec![],
        };
        let lines = find(&opts).unwrap();
        assert_eq!(lines, vec!["b1: /a.txt".to_string()]);
    }
}
