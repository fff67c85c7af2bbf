//! # Backup Archives
//!
//! Snapshots the console's persistent folders (`Library` and `Settings`) from
//! the SD card into a zip file named `analogue3d_backup_<timestamp>.zip`.
//!
//! ## Entry layout
//!
//! - Every path is relative to the card root and uses `/` separators, whatever
//!   the host convention.
//! - Folders keep their on-disk casing (`library`, `LIBRARY` and `Library` are
//!   all picked up and stored as found).
//! - Files are deflate-compressed entries.
//! - A zero-length directory marker (name ending in `/`) is written for each
//!   top-level folder and for every folder holding no files at any depth.
//!   Without a marker such a folder would not survive a restore.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{IoResultExt, Result, UpdaterError};
use crate::fsx::normalize_entry_path;

pub const BACKUP_PREFIX: &str = "analogue3d_backup_";
pub const BACKUP_EXTENSION: &str = ".zip";
/// Fixed width, so file names sort the same way as the times they encode.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
/// Top-level folders worth backing up, compared case-insensitively.
pub const BACKUP_FOLDERS: &[&str] = &["library", "settings"];

/// A backup zip on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    pub path: PathBuf,
    /// Parsed from the file name; `None` if the name carries no valid timestamp.
    pub created_at: Option<NaiveDateTime>,
}

impl BackupArchive {
    /// Wraps `path` if its file name follows the backup naming scheme.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if !is_backup_name(name) {
            return None;
        }
        let stamp = &name[BACKUP_PREFIX.len()..name.len() - BACKUP_EXTENSION.len()];
        Some(Self {
            path: path.to_path_buf(),
            created_at: NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// True for names matching `analogue3d_backup_*.zip`.
pub fn is_backup_name(name: &str) -> bool {
    name.len() >= BACKUP_PREFIX.len() + BACKUP_EXTENSION.len()
        && name.starts_with(BACKUP_PREFIX)
        && name.ends_with(BACKUP_EXTENSION)
}

pub fn backup_file_name(at: &NaiveDateTime) -> String {
    format!("{}{}{}", BACKUP_PREFIX, at.format(TIMESTAMP_FORMAT), BACKUP_EXTENSION)
}

/// One entry inside a backup zip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative, `/`-separated; directories end in `/`.
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Top-level directories of `volume_root` that get backed up, with their
/// on-disk names, sorted.
pub fn backup_folders(volume_root: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(volume_root).at(volume_root)? {
        let entry = entry.at(volume_root)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !BACKUP_FOLDERS.contains(&name.to_lowercase().as_str()) {
            continue;
        }
        if entry.path().is_dir() {
            found.push(name);
        }
    }
    found.sort();
    Ok(found)
}

/// `path` relative to `root`, as a `/`-separated archive name.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        UpdaterError::io(
            io::Error::new(io::ErrorKind::InvalidInput, "path escapes the volume root"),
            path,
        )
    })?;
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(normalize_entry_path(&joined))
}

/// Backs up the card's `Library` and `Settings` folders into `backup_dir`,
/// stamped with the current local time.
pub fn create_backup(volume_root: &Path, backup_dir: &Path) -> Result<BackupArchive> {
    create_backup_at(volume_root, backup_dir, &chrono::Local::now().naive_local())
}

/// Like [`create_backup`] with an explicit timestamp. A missing `Library` or
/// `Settings` is not an error; the archive then simply holds less.
pub fn create_backup_at(volume_root: &Path, backup_dir: &Path, at: &NaiveDateTime) -> Result<BackupArchive> {
    let folders = backup_folders(volume_root)?;
    if folders.is_empty() {
        info!(root = %volume_root.display(), "no Library or Settings folder found, writing an empty backup");
    }

    fs::create_dir_all(backup_dir).at(backup_dir)?;
    let out_path = backup_dir.join(backup_file_name(at));
    let out_file = File::create(&out_path).at(&out_path)?;
    let mut zip = ZipWriter::new(out_file);

    let file_opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let dir_opts = FileOptions::default().compression_method(CompressionMethod::Stored);

    let (mut dirs, mut files) = (0usize, 0usize);
    for folder in &folders {
        let top = volume_root.join(folder);
        zip.add_directory(format!("{}/", entry_name(volume_root, &top)?), dir_opts)?;
        dirs += 1;

        // Collect first: whether a folder needs a marker depends on what is below it.
        let mut sub_dirs = Vec::new();
        let mut file_paths = Vec::new();
        for entry in WalkDir::new(&top).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let ft = entry.file_type();
            if ft.is_dir() {
                sub_dirs.push(entry.into_path());
            } else if ft.is_file() {
                file_paths.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "skipping non-regular entry");
            }
        }

        let mut holds_files: HashSet<PathBuf> = HashSet::new();
        for file in &file_paths {
            for ancestor in file.ancestors().skip(1) {
                if ancestor == top || !holds_files.insert(ancestor.to_path_buf()) {
                    break;
                }
            }
        }

        for dir in sub_dirs.iter().filter(|d| !holds_files.contains(*d)) {
            let name = format!("{}/", entry_name(volume_root, dir)?);
            debug!(entry = %name, "directory marker");
            zip.add_directory(name, dir_opts)?;
            dirs += 1;
        }

        for path in &file_paths {
            let name = entry_name(volume_root, path)?;
            debug!(entry = %name, "file");
            zip.start_file(name, file_opts)?;
            let mut src = File::open(path).at(path)?;
            io::copy(&mut src, &mut zip).at(path)?;
            files += 1;
        }
    }

    zip.finish()?;
    info!(archive = %out_path.display(), dirs, files, "backup written");
    Ok(BackupArchive {
        created_at: Some(*at),
        path: out_path,
    })
}

/// Lists the entries of a backup in archive order.
pub fn list_entries(archive_path: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(archive_path).at(archive_path)?;
    let mut zip = ZipArchive::new(file)?;
    let mut entries = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        entries.push(ArchiveEntry {
            path: entry.name().to_string(),
            is_dir: entry.is_dir(),
            size: entry.size(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn file_name_round_trips_timestamp() {
        let stamp = at(2025, 6, 1, 12, 0, 5);
        let name = backup_file_name(&stamp);
        assert_eq!(name, "analogue3d_backup_2025-06-01_12-00-05.zip");
        let archive = BackupArchive::from_path(Path::new(&name)).unwrap();
        assert_eq!(archive.created_at, Some(stamp));
    }

    #[test]
    fn from_path_rejects_other_names() {
        assert!(BackupArchive::from_path(Path::new("backup.zip")).is_none());
        assert!(BackupArchive::from_path(Path::new("analogue3d_backup_x.tar")).is_none());
        let odd = BackupArchive::from_path(Path::new("analogue3d_backup_manual.zip")).unwrap();
        assert_eq!(odd.created_at, None);
    }

    #[test]
    fn only_library_and_settings_dirs_are_selected() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("LIBRARY")).unwrap();
        fs::create_dir(root.path().join("settings")).unwrap();
        fs::create_dir(root.path().join("Saves")).unwrap();
        fs::write(root.path().join("Library.txt"), b"x").unwrap();
        assert_eq!(backup_folders(root.path()).unwrap(), vec!["LIBRARY", "settings"]);
    }

    #[test]
    fn markers_only_for_file_free_folders() {
        let root = tempdir().unwrap();
        let lib = root.path().join("Library");
        fs::create_dir_all(lib.join("N64/Images")).unwrap();
        fs::write(lib.join("N64/Images/labels.db"), b"db").unwrap();
        fs::create_dir_all(lib.join("Empty/Nested")).unwrap();
        let out = tempdir().unwrap();

        let archive = create_backup_at(root.path(), out.path(), &at(2025, 1, 1, 0, 0, 0)).unwrap();
        let names: Vec<String> = list_entries(&archive.path).unwrap().into_iter().map(|e| e.path).collect();

        assert!(names.contains(&"Library/".to_string()));
        assert!(names.contains(&"Library/Empty/".to_string()));
        assert!(names.contains(&"Library/Empty/Nested/".to_string()));
        assert!(names.contains(&"Library/N64/Images/labels.db".to_string()));
        assert!(!names.contains(&"Library/N64/".to_string()));
        assert!(!names.contains(&"Library/N64/Images/".to_string()));
        assert!(names.iter().all(|n| !n.contains('\\')));
    }

    #[test]
    fn backup_without_folders_is_still_valid() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("a3d_os_1.bin"), b"fw").unwrap();
        let out = tempdir().unwrap();
        let archive = create_backup_at(root.path(), &out.path().join("backups"), &at(2025, 1, 1, 0, 0, 0)).unwrap();
        assert!(archive.path.exists());
        assert!(list_entries(&archive.path).unwrap().is_empty());
    }
}
