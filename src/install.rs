//! # Installer
//!
//! Places fetched artifacts on the SD card. The console wants exactly one
//! firmware image at the card root, so every other `a3d_os_*.bin` found there
//! is removed after the new one is copied in.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{IoResultExt, Result};
use crate::fetch::LocalArtifact;
use crate::fsx;

pub const FIRMWARE_PREFIX: &str = "a3d_os_";
pub const FIRMWARE_SUFFIX: &str = ".bin";
/// Where the console looks for the cartridge label database, relative to the card root.
pub const LABELS_DIR: &[&str] = &["Library", "N64", "Images"];
pub const LABELS_FILENAME: &str = "labels.db";

/// Outcome of a firmware install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareInstall {
    pub installed: PathBuf,
    /// Stale images that were deleted.
    pub removed: Vec<String>,
    /// Stale images that could not be deleted. Not fatal.
    pub failed: Vec<String>,
}

impl FirmwareInstall {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// True for names like `a3d_os_1_2_0.bin`.
pub fn is_firmware_name(name: &str) -> bool {
    name.len() >= FIRMWARE_PREFIX.len() + FIRMWARE_SUFFIX.len()
        && name.starts_with(FIRMWARE_PREFIX)
        && name.ends_with(FIRMWARE_SUFFIX)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn copy_artifact(artifact: &LocalArtifact, dest: &Path) -> Result<()> {
    if same_file(&artifact.path, dest) {
        return Ok(());
    }
    fs::copy(&artifact.path, dest).at(dest)?;
    Ok(())
}

/// Copies the firmware image to the card root and deletes any older image
/// sitting next to it. Only the top level of `volume_root` is scanned.
pub fn install_firmware(artifact: &LocalArtifact, volume_root: &Path) -> Result<FirmwareInstall> {
    fsx::ensure_writable_dir(volume_root)?;
    let filename = artifact.filename();
    let dest = volume_root.join(&filename);
    info!(dest = %dest.display(), "copying firmware");
    copy_artifact(artifact, &dest)?;

    let mut report = FirmwareInstall { installed: dest, ..Default::default() };
    for entry in fs::read_dir(volume_root).at(volume_root)? {
        let entry = entry.at(volume_root)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == filename || !is_firmware_name(&name) {
            continue;
        }
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(file = %name, "removed old firmware");
                report.removed.push(name);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "could not remove old firmware");
                report.failed.push(name);
            }
        }
    }
    report.removed.sort();
    report.failed.sort();
    Ok(report)
}

/// Copies the label database to `Library/N64/Images/labels.db`, creating the
/// folders as needed and replacing any existing copy.
pub fn install_labels_database(artifact: &LocalArtifact, volume_root: &Path) -> Result<PathBuf> {
    fsx::ensure_writable_dir(volume_root)?;
    let dir = LABELS_DIR.iter().fold(volume_root.to_path_buf(), |p, c| p.join(c));
    fs::create_dir_all(&dir).at(&dir)?;
    let dest = dir.join(LABELS_FILENAME);
    info!(dest = %dest.display(), "copying label database");
    copy_artifact(artifact, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_name_pattern() {
        assert!(is_firmware_name("a3d_os_102.bin"));
        assert!(is_firmware_name("a3d_os_.bin"));
        assert!(!is_firmware_name("a3d_os_102.bin.bak"));
        assert!(!is_firmware_name("A3D_OS_102.BIN"));
        assert!(!is_firmware_name("a3d_os.bin"));
    }
}
