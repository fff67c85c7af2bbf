//! # Restore
//!
//! Lists available backups and writes one back onto a card.
//!
//! Restoring overwrites files on the card, so [`restore`] demands a
//! [`RestoreConfirmation`], which can only be obtained by parsing the exact word
//! the operator has to type. The restore is purely additive: files on the card
//! that are not in the archive are left alone.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::archive::BackupArchive;
use crate::error::{IoResultExt, Result, UpdaterError};
use crate::fsx;

/// The word an operator must type to allow a restore.
pub const CONFIRM_WORD: &str = "RESTORE";

/// Proof that the operator agreed to overwrite the card.
#[derive(Debug)]
pub struct RestoreConfirmation(());

impl RestoreConfirmation {
    /// Succeeds only for exactly [`CONFIRM_WORD`], surrounding whitespace aside.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim() == CONFIRM_WORD {
            Ok(Self(()))
        } else {
            Err(UpdaterError::Cancelled)
        }
    }
}

/// Counts from a finished restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub directories: usize,
    pub files: usize,
    /// Entry names that would have landed outside the card root.
    pub skipped: Vec<String>,
}

/// Backups found in `backup_dir`, newest first. A missing directory simply
/// means there are none.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<BackupArchive>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir).at(backup_dir)? {
        let entry = entry.at(backup_dir)?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(archive) = BackupArchive::from_path(&entry.path()) {
            backups.push(archive);
        }
    }
    // The timestamp is fixed width, so name order is time order.
    backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(backups)
}

/// Extracts every entry of `archive` below `volume_root`, creating folders and
/// overwriting files as needed. Directory markers become empty directories.
pub fn restore(
    archive: &BackupArchive,
    volume_root: &Path,
    _confirmation: &RestoreConfirmation,
) -> Result<RestoreReport> {
    fsx::ensure_writable_dir(volume_root)?;
    let file = File::open(&archive.path).at(&archive.path)?;
    let mut zip = ZipArchive::new(file)?;
    info!(archive = %archive.path.display(), entries = zip.len(), root = %volume_root.display(), "restoring");

    let mut report = RestoreReport::default();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(rel) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = entry.name(), "skipping entry outside the card root");
            report.skipped.push(entry.name().to_string());
            continue;
        };
        let target = volume_root.join(&rel);

        if entry.is_dir() {
            debug!(dir = %target.display(), "mkdir");
            fs::create_dir_all(&target).at(&target)?;
            report.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        debug!(file = %target.display(), bytes = entry.size(), "write");
        let mut out = File::create(&target).at(&target)?;
        io::copy(&mut entry, &mut out).at(&target)?;
        report.files += 1;
    }

    info!(dirs = report.directories, files = report.files, "restore finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    #[test]
    fn confirmation_requires_exact_word() {
        assert!(RestoreConfirmation::parse("RESTORE").is_ok());
        assert!(RestoreConfirmation::parse("  RESTORE\n").is_ok());
        assert!(matches!(RestoreConfirmation::parse("restore"), Err(UpdaterError::Cancelled)));
        assert!(RestoreConfirmation::parse("y").is_err());
        assert!(RestoreConfirmation::parse("").is_err());
    }

    #[test]
    fn backups_sorted_newest_first() {
        let dir = tempdir().unwrap();
        for stamp in ["2025-01-01_00-00-00", "2025-06-01_12-00-00", "2024-12-31_23-59-59"] {
            fs::write(dir.path().join(format!("analogue3d_backup_{}.zip", stamp)), b"").unwrap();
        }
        fs::write(dir.path().join("notes.zip"), b"").unwrap();
        fs::create_dir(dir.path().join("analogue3d_backup_dir.zip")).unwrap();

        let names: Vec<String> = list_backups(dir.path()).unwrap().iter().map(|b| b.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "analogue3d_backup_2025-06-01_12-00-00.zip",
                "analogue3d_backup_2025-01-01_00-00-00.zip",
                "analogue3d_backup_2024-12-31_23-59-59.zip",
            ]
        );
    }

    #[test]
    fn missing_backup_dir_lists_nothing() {
        let dir = tempdir().unwrap();
        assert!(list_backups(&dir.path().join("backups")).unwrap().is_empty());
    }

    #[test]
    fn escaping_entries_are_skipped() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("analogue3d_backup_2025-01-01_00-00-00.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
            zip.start_file("../evil.txt", FileOptions::default()).unwrap();
            zip.write_all(b"nope").unwrap();
            zip.start_file("Settings/ok.cfg", FileOptions::default()).unwrap();
            zip.write_all(b"ok").unwrap();
            zip.finish().unwrap();
        }
        let card = dir.path().join("card");
        fs::create_dir(&card).unwrap();
        let archive = BackupArchive::from_path(&zip_path).unwrap();
        let confirm = RestoreConfirmation::parse(CONFIRM_WORD).unwrap();

        let report = restore(&archive, &card, &confirm).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.skipped, vec!["../evil.txt".to_string()]);
        assert!(!dir.path().join("evil.txt").exists());
        assert_eq!(fs::read(card.join("Settings/ok.cfg")).unwrap(), b"ok");
    }
}
