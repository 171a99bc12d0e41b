//! Injected error policy (spec §7, §9 Design Notes: "retry loop with
//! prompt"). `BackupEngine`/`RestoreEngine` take `&mut dyn ErrorPolicy` at
//! their only interactive seam, so they stay unit-testable without a TTY;
//! the CLI shell binds a concrete interactive (or `-g`) policy.

use std::io::{self, Write};
use std::path::Path;

use crate::error::Error;

/// Resolution to a per-file read failure (spec §7): cancel the whole
/// operation, drop the entry and continue, or retry the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Cancel,
    Ignore,
    Retry,
}

/// Resolution to a tar-write failure. Deliberately has no `Ignore` variant:
/// spec §4.G step 6 only offers cancel/retry for a write failure, since a
/// half-written volume can't simply be skipped past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResolution {
    Cancel,
    Retry,
}

pub trait ErrorPolicy {
    fn on_read_error(&mut self, path: &Path, err: &Error) -> Resolution;
    fn on_write_error(&mut self, path: &Path, err: &Error) -> WriteResolution;
}

/// Prompts on stdin/stderr exactly once per failure (spec §7's three-way
/// cancel/ignore/retry prompt). Bound by `main.rs` when `-g` is absent.
pub struct InteractivePolicy;

impl ErrorPolicy for InteractivePolicy {
    fn on_read_error(&mut self, path: &Path, err: &Error) -> Resolution {
        eprintln!("error reading {}: {err}", path.display());
        loop {
            eprint!("(c)ancel, (i)gnore, (r)etry? ");
            let _ = io::stderr().flush();
            let mut line = String::new();
            if io::stdin().read_line(&mut line).is_err() {
                return Resolution::Cancel;
            }
            match line.trim() {
                "c" => return Resolution::Cancel,
                "i" => return Resolution::Ignore,
                "r" => return Resolution::Retry,
                _ => continue,
            }
        }
    }

    fn on_write_error(&mut self, path: &Path, err: &Error) -> WriteResolution {
        eprintln!("error writing {}: {err}", path.display());
        loop {
            eprint!("(c)ancel, (r)etry? ");
            let _ = io::stderr().flush();
            let mut line = String::new();
            if io::stdin().read_line(&mut line).is_err() {
                return WriteResolution::Cancel;
            }
            match line.trim() {
                "c" => return WriteResolution::Cancel,
                "r" => return WriteResolution::Retry,
                _ => continue,
            }
        }
    }
}

/// `-g/--ignore`: every read failure is dropped from the working set
/// without prompting. Write failures still cancel — there's no
/// unattended-safe way to "ignore" a half-written volume.
pub struct NonInteractivePolicy;

impl ErrorPolicy for NonInteractivePolicy {
    fn on_read_error(&mut self, _path: &Path, _err: &Error) -> Resolution {
        Resolution::Ignore
    }

    fn on_write_error(&mut self, _path: &Path, _err: &Error) -> WriteResolution {
        WriteResolution::Cancel
    }
}

#[cfg(test)]
pub struct ScriptedPolicy {
    pub reads: Vec<Resolution>,
    pub writes: Vec<WriteResolution>,
}

#[cfg(test)]
impl ErrorPolicy for ScriptedPolicy {
    fn on_read_error(&mut self, _path: &Path, _err: &Error) -> Resolution {
        if self.reads.is_empty() {
            Resolution::Cancel
        } else {
            self.reads.remove(0)
        }
    }

    fn on_write_error(&mut self, _path: &Path, _err: &Error) -> WriteResolution {
        if self.writes.is_empty() {
            WriteResolution::Cancel
        } else {
            self.writes.remove(0)
        }
    }
}
