//! Library entry for migrator: host state capture, backup and cross-distribution restore.
//!
//! The binary in `main.rs` is a thin clap layer over [`ops`]; everything
//! below is usable (and tested) without a terminal.

pub mod backup;
pub mod context;
pub mod distro;
pub mod equivalence;
pub mod error;
pub mod fstab;
pub mod managers;
pub mod ops;
pub mod paths;
pub mod pathvars;
pub mod restore;
pub mod settings;
pub mod snapshot;
pub mod tracking;
pub mod util;

pub use context::{CancelToken, Context};
pub use error::{MigratorError, Result};
