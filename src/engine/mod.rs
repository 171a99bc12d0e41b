//! Component G/H/I: the three top-level orchestrators (spec §2 control
//! flow). Each composes the lower-level components; `main.rs` selects one
//! per CLI subcommand.

pub mod backup;
pub mod find;
pub mod restore;

pub use backup::{create, CreateOptions, CreateReport};
pub use find::{find, FindOptions};
pub use restore::{restore, RestoreOptions, RestoreReport};
