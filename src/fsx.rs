//! Cross-platform filesystem helpers.
//!
//! On Unix writability is asked of the kernel through `access(2)`, so mount
//! flags and ownership are honoured. On Windows only the read-only attribute
//! is available and is used instead.

use std::path::Path;

use crate::error::{Result, UpdaterError};

#[cfg(unix)]
/// True if the current user may write into `path`.
pub fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = match CString::new(path.as_os_str().as_bytes()) {
        Ok(p) => p,
        Err(_) => return false,
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
/// True if the current user may write into `path`.
pub fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Checks that `root` is an existing, writable directory.
pub fn ensure_writable_dir(root: &Path) -> Result<()> {
    if !root.exists() {
        return Err(UpdaterError::invalid_target(root, "path does not exist"));
    }
    if !root.is_dir() {
        return Err(UpdaterError::invalid_target(root, "path is not a directory"));
    }
    if !is_writable(root) {
        return Err(UpdaterError::invalid_target(root, "path is not writable"));
    }
    Ok(())
}

/// Normalize a relative path for storage inside an archive: backslashes become
/// forward slashes, a leading `./` and repeated slashes are dropped.
/// Example: `.\Library\N64\x.sav` becomes `Library/N64/x.sav`.
pub fn normalize_entry_path(path: &str) -> String {
    let s = path.replace('\\', "/");
    let trimmed = s.strip_prefix("./").unwrap_or(&s);
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}
