//! Component C: PatternFilter (spec §4.C). Shell-glob include/exclude over a
//! [`FileList`], matched against the full key (which always starts with
//! `/`), the way `examples/other_examples/…pantsbuild-pants…/fs.rs` matches
//! `glob::Pattern` against a full virtual path.

use glob::Pattern;

use crate::error::Error;
use crate::model::FileList;

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, Error> {
    patterns.iter().map(|p| Pattern::new(p).map_err(Error::from)).collect()
}

/// Keep only entries matching at least one pattern. A no-op if `patterns` is
/// empty. Used by `find` (spec §4.I), which does not need containing
/// directories to survive.
pub fn include(filelist: &mut FileList, patterns: &[String]) -> Result<(), Error> {
    if patterns.is_empty() {
        return Ok(());
    }
    let globs = compile(patterns)?;
    for info in filelist.values_mut() {
        info.marked = false;
    }
    for (key, info) in filelist.iter_mut() {
        if globs.iter().any(|g| g.matches(key)) {
            info.marked = true;
        }
    }
    filelist.retain(|_, info| info.marked);
    Ok(())
}

/// Same as [`include`], but also marks every ancestor directory of each
/// matched key, so containing directories survive the retain pass. Used by
/// `create` and `restore` (spec §4.C).
pub fn include_hierarchy(filelist: &mut FileList, patterns: &[String]) -> Result<(), Error> {
    if patterns.is_empty() {
        return Ok(());
    }
    let globs = compile(patterns)?;
    for info in filelist.values_mut() {
        info.marked = false;
    }

    let matched: Vec<String> = filelist
        .iter()
        .filter(|(key, _)| globs.iter().any(|g| g.matches(key.as_str())))
        .map(|(key, _)| key.clone())
        .collect();

    for key in &matched {
        mark_with_ancestors(filelist, key);
    }
    filelist.retain(|_, info| info.marked);
    Ok(())
}

fn mark_with_ancestors(filelist: &mut FileList, key: &str) {
    if let Some(info) = filelist.get_mut(key) {
        info.marked = true;
    }
    let mut cur = key;
    while let Some(pos) = cur.rfind('/') {
        let parent = &cur[..pos];
        if parent.is_empty() {
            break;
        }
        match filelist.get_mut(parent) {
            Some(info) => {
                if info.marked {
                    // Already marked on a previous pass through this loop (or
                    // by a sibling match); its own ancestors are therefore
                    // already marked too.
                    break;
                }
                info.marked = true;
            }
            None => {}
        }
        cur = parent;
    }
}

/// Remove every entry matching any pattern. Applied after `include`
/// (spec §4.C: "include/exclude are applied in that order").
pub fn exclude(filelist: &mut FileList, patterns: &[String]) -> Result<(), Error> {
    if patterns.is_empty() {
        return Ok(());
    }
    let globs = compile(patterns)?;
    filelist.retain(|key, _| !globs.iter().any(|g| g.matches(key)));
    Ok(())
}

/// Synthesize any missing ancestor directory entries for every file key.
/// Applied after loading a catalogue, before `restore` filters it further
/// (spec §4.C). The synthesized mtime is copied from the descendant that
/// triggered the insertion — semantically arbitrary (spec §9 flags this),
/// but kept as specified rather than silently changed; see `SPEC_FULL.md` §C.
pub fn fix_hierarchy(filelist: &mut FileList) {
    let file_keys: Vec<(String, u64)> = filelist
        .iter()
        .filter(|(_, info)| !info.is_dir)
        .map(|(key, info)| (key.clone(), info.mtime))
        .collect();

    for (key, mtime) in file_keys {
        let mut cur = key.as_str();
        while let Some(pos) = cur.rfind('/') {
            let parent = &cur[..pos];
            if parent.is_empty() {
                break;
            }
            if filelist.contains_key(parent) {
                break;
            }
            filelist.insert(parent.to_string(), crate::model::FileInfo::new_dir(mtime));
            cur = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileInfo;

    fn sample() -> FileList {
        let mut fl = FileList::new();
        fl.insert("/x".into(), FileInfo::new_dir(1));
        fl.insert("/x/y".into(), FileInfo::new_dir(1));
        fl.insert("/x/y/z.txt".into(), FileInfo::new_unpopulated_file());
        fl.insert("/x/q.txt".into(), FileInfo::new_unpopulated_file());
        fl
    }

    #[test]
    fn include_without_hierarchy_drops_unmatched_and_ancestors() {
        let mut fl = sample();
        include(&mut fl, &["/x/y/*".to_string()]).unwrap();
        let keys: Vec<_> = fl.keys().cloned().collect();
        assert_eq!(keys, vec!["/x/y/z.txt".to_string()]);
    }

    #[test]
    fn include_hierarchy_keeps_ancestors() {
        let mut fl = sample();
        include_hierarchy(&mut fl, &["/x/y/*".to_string()]).unwrap();
        let keys: Vec<_> = fl.keys().cloned().collect();
        assert_eq!(keys, vec!["/x".to_string(), "/x/y".to_string(), "/x/y/z.txt".to_string()]);
    }

    #[test]
    fn empty_patterns_are_a_no_op() {
        let mut fl = sample();
        let before = fl.clone();
        include(&mut fl, &[]).unwrap();
        exclude(&mut fl, &[]).unwrap();
        assert_eq!(fl, before);
    }

    #[test]
    fn exclude_after_include_removes_matches() {
        let mut fl = sample();
        include_hierarchy(&mut fl, &["/x/*".to_string(), "/x/y/*".to_string()]).unwrap();
        exclude(&mut fl, &["/x/q.txt".to_string()]).unwrap();
        assert!(!fl.contains_key("/x/q.txt"));
        assert!(fl.contains_key("/x/y/z.txt"));
    }

    #[test]
    fn fix_hierarchy_synthesizes_missing_ancestors() {
        let mut fl = FileList::new();
        fl.insert("/a/b/c.txt".into(), {
            let mut info = FileInfo::new_unpopulated_file();
            info.mtime = 99;
            info
        });
        fix_hierarchy(&mut fl);
        assert!(fl["/a"].is_dir);
        assert!(fl["/a/b"].is_dir);
        assert_eq!(fl["/a"].mtime, 99);
        assert_eq!(fl["/a/b"].mtime, 99);
    }

    #[test]
    fn fix_hierarchy_does_not_disturb_existing_dirs() {
        let mut fl = sample();
        fix_hierarchy(&mut fl);
        assert_eq!(fl["/x"].mtime, 1);
        assert_eq!(fl.len(), 4);
    }
}
