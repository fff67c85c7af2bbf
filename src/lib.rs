//! # a3d-updater Core Library
//!
//! Keeps an Analogue 3D SD card current. The `a3d-updater` binary wraps this
//! library in an interactive menu, but every step is usable on its own.
//!
//! ## Key Modules
//!
//! - [`remote`]: Finds the current firmware and label database download URLs.
//! - [`fetch`]: Streams a remote file to local disk.
//! - [`volume`]: Detects mounted volumes that look like an SD card.
//! - [`install`]: Copies artifacts onto the card and removes stale firmware.
//! - [`archive`]: Writes zip backups of the card's `Library` and `Settings` folders.
//! - [`extract`]: Lists backups and restores one onto a card.
//! - [`session`]: The interactive menu tying the steps together.
//!
//! ## Examples
//!
//! ```no_run
//! use std::path::Path;
//!
//! let backup = a3d_updater::archive::create_backup(Path::new("/media/sd"), Path::new("backups"))?;
//! println!("saved {}", backup.path.display());
//! # Ok::<(), a3d_updater::UpdaterError>(())
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub use error::{Result, UpdaterError};

pub mod extract;
pub mod fetch;
pub mod install;
pub mod logging;
pub mod progress;
pub mod remote;
pub mod session;
pub mod volume;

// Cross-platform filesystem helpers
pub mod fsx;

#[cfg(test)]
mod testutil;
