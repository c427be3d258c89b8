//! Filesystem support for converge
//!
//! Provides the small set of on-disk primitives the reconciler needs:
//! atomic writes, a non-blocking run lock, content checksums and
//! format-detected loading of settings files.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod lock;

pub use checksum::{compute_checksum, is_checksum};
pub use config::{ConfigStore, Format};
pub use error::{Error, Result};
pub use lock::RunLockFile;
