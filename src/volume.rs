//! # Volume Locator
//!
//! Finds mounted volumes that look like an SD card. The rule is a loose
//! heuristic with high recall: a volume qualifies when it is writable and it is
//! either flagged removable, formatted with a filesystem SD cards ship with, or
//! mounted under a conventional removable-media prefix. The operator always gets
//! a manual-path fallback on top of this list.

use std::collections::HashSet;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use sysinfo::Disks;
use tracing::debug;

use crate::fsx;

const SD_FILESYSTEMS: &[&str] = &["fat", "fat32", "exfat", "vfat", "ntfs"];
const REMOVABLE_PREFIXES: &[&str] = &["/media/", "/run/media/", "/Volumes/", "/mnt/"];
const GIB: u64 = 1024 * 1024 * 1024;

/// One mounted filesystem as reported by the host.
#[derive(Debug, Clone, Default)]
pub struct MountRecord {
    pub mount_path: PathBuf,
    pub fs_type: String,
    /// Mount options, lowercased (e.g. `rw`, `nosuid`, `removable`).
    pub options: Vec<String>,
    /// Host says the underlying device is removable.
    pub removable: bool,
    pub writable: bool,
    /// `None` if the free-space query failed.
    pub free_bytes: Option<u64>,
}

/// A volume the operator may pick as the SD card root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCandidate {
    /// Mount path with exactly one trailing separator.
    pub mount_path: String,
    pub free_gib: u64,
}

impl VolumeCandidate {
    pub fn root(&self) -> &Path {
        Path::new(&self.mount_path)
    }
}

/// Appends a single trailing separator to `path`.
pub fn with_trailing_separator(path: &Path) -> String {
    let s = path.to_string_lossy();
    let trimmed = s.trim_end_matches(|c: char| c == '/' || c == MAIN_SEPARATOR);
    format!("{}{}", trimmed, MAIN_SEPARATOR)
}

impl MountRecord {
    fn has_removable_option(&self) -> bool {
        self.removable || self.options.iter().any(|o| o.contains("removable"))
    }

    fn has_sd_filesystem(&self) -> bool {
        let fs = self.fs_type.to_ascii_lowercase();
        SD_FILESYSTEMS.contains(&fs.as_str())
    }

    fn under_removable_prefix(&self) -> bool {
        let path = self.mount_path.to_string_lossy();
        REMOVABLE_PREFIXES.iter().any(|p| path.starts_with(p))
    }

    /// writable AND (removable OR SD filesystem OR removable-media prefix)
    pub fn is_candidate(&self) -> bool {
        self.writable
            && (self.has_removable_option() || self.has_sd_filesystem() || self.under_removable_prefix())
    }
}

/// Filters `records` down to SD card candidates, first occurrence wins on
/// duplicate mount paths. Missing free space is reported as 0.
pub fn filter_candidates<I>(records: I) -> Vec<VolumeCandidate>
where
    I: IntoIterator<Item = MountRecord>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in records {
        if !record.is_candidate() {
            debug!(mount = %record.mount_path.display(), fs = %record.fs_type, "skipping volume");
            continue;
        }
        let mount_path = with_trailing_separator(&record.mount_path);
        if !seen.insert(mount_path.clone()) {
            continue;
        }
        out.push(VolumeCandidate {
            mount_path,
            free_gib: record.free_bytes.unwrap_or(0) / GIB,
        });
    }
    out
}

#[cfg(target_os = "linux")]
fn mount_options() -> std::collections::HashMap<PathBuf, Vec<String>> {
    let mut map = std::collections::HashMap::new();
    let Ok(text) = std::fs::read_to_string("/proc/self/mounts") else {
        return map;
    };
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        // /proc/mounts escapes spaces as \040
        let mount = fields[1].replace("\\040", " ");
        let opts = fields[3].split(',').map(|o| o.to_ascii_lowercase()).collect();
        map.insert(PathBuf::from(mount), opts);
    }
    map
}

#[cfg(not(target_os = "linux"))]
fn mount_options() -> std::collections::HashMap<PathBuf, Vec<String>> {
    std::collections::HashMap::new()
}

/// Snapshot of every volume the host currently has mounted.
pub fn mounted_volumes() -> Vec<MountRecord> {
    let disks = Disks::new_with_refreshed_list();
    let options = mount_options();
    disks
        .iter()
        .map(|disk| {
            let mount_path = disk.mount_point().to_path_buf();
            let free = disk.available_space();
            MountRecord {
                writable: fsx::is_writable(&mount_path),
                options: options.get(&mount_path).cloned().unwrap_or_default(),
                fs_type: disk.file_system().to_string_lossy().into_owned(),
                removable: disk.is_removable(),
                free_bytes: if disk.total_space() > 0 { Some(free) } else { None },
                mount_path,
            }
        })
        .collect()
}

/// Lists SD card candidates on this host.
pub fn list_candidates() -> Vec<VolumeCandidate> {
    filter_candidates(mounted_volumes())
}
