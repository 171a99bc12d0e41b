use std::io;
use std::path::{Path, PathBuf};

/// Typed error kinds for the core (spec §7). The CLI shell never matches on
/// these directly — it only ever propagates them to `anyhow` at the
/// `main`/`run` boundary — but the engines and retry-loop policies dispatch
/// on them to decide what an operator may do about a given failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: io::Error },

    #[error("OS error at {path}: {source}")]
    Os { path: PathBuf, #[source] source: io::Error },

    #[error("tar error: {0}")]
    Tar(#[source] io::Error),

    #[error("malformed catalogue: {0}")]
    CatalogueFormat(String),

    #[error("content key requested for a directory or un-inspected entry: {0}")]
    HashName(String),

    #[error("{0} not found in any volume")]
    NotFound(String),

    #[error("{0}")]
    Precondition(String),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub fn os(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Os { path: path.as_ref().to_path_buf(), source }
    }

    pub fn tar(source: io::Error) -> Self {
        Error::Tar(source)
    }

    /// True for the kinds a read-error retry prompt covers (spec §4.G step 6:
    /// "On IoFailure/OsFailure reading a file").
    pub fn is_read_failure(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Os { .. })
    }
}
