//! Human-readable progress printing (spec §1: an external collaborator,
//! outside the core). Engines accept `&mut dyn Reporter` and never print
//! directly themselves.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum BackupEvent {
    Added { path: String, key: String },
    Deduped { path: String, key: String },
    Reused { path: String, key: String, from: String },
    ReadIgnored { path: String },
    DirCreated { path: PathBuf },
    Extracted { path: String },
    SkippedIdentical { path: String },
    Deleted { path: PathBuf },
}

pub trait Reporter {
    fn on_event(&mut self, event: BackupEvent);
}

/// Plain `println!` output — the register `tcow`'s `cmd_*` functions use
/// for a single-shot CLI tool, not a structured/JSON logging framework.
pub struct PrintReporter;

impl Reporter for PrintReporter {
    fn on_event(&mut self, event: BackupEvent) {
        match event {
            BackupEvent::Added { path, key } => println!("a {path}  [{key}]"),
            BackupEvent::Deduped { path, key } => println!("= {path}  [{key}] (dedup)"),
            BackupEvent::Reused { path, key, from } => {
                println!("r {path}  [{key}] (reused from {from})")
            }
            BackupEvent::ReadIgnored { path } => println!("! {path} (ignored)"),
            BackupEvent::DirCreated { path } => println!("d {}", path.display()),
            BackupEvent::Extracted { path } => println!("x {path}"),
            BackupEvent::SkippedIdentical { path } => println!(". {path} (unchanged)"),
            BackupEvent::Deleted { path } => println!("- {}", path.display()),
        }
    }
}

/// Used by `find` (which has nothing to report) and by tests that only
/// care about the returned report value.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_event(&mut self, _event: BackupEvent) {}
}
