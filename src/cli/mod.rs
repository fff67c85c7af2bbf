use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, UpdaterError};
use crate::remote::{FIRMWARE_PAGE, LABELS_DB_URL};

/// Interactive helper for keeping an Analogue 3D SD card up to date.
///
/// All options have sensible defaults; the tool itself is driven from a menu.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding backup archives. Defaults to `backups/` next to the executable.
    #[arg(long, env = "A3D_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Directory downloads are saved to. Defaults to the current directory.
    #[arg(long, env = "A3D_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// HTTP timeout in seconds for each request.
    #[arg(long, env = "A3D_HTTP_TIMEOUT", default_value_t = 60)]
    pub timeout: u64,

    /// Page the firmware download link is scraped from.
    #[arg(long, env = "A3D_FIRMWARE_PAGE", default_value = FIRMWARE_PAGE)]
    pub firmware_page: String,

    /// Always-latest URL of the cartridge label database.
    #[arg(long, env = "A3D_LABELS_URL", default_value = LABELS_DB_URL)]
    pub labels_url: String,

    /// Log debug output to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Resolved settings for a session.
#[derive(Debug, Clone)]
pub struct Config {
    pub backup_dir: PathBuf,
    pub work_dir: PathBuf,
    pub timeout: Duration,
    pub firmware_page: String,
    pub labels_url: String,
}

/// `backups/` next to the running executable.
pub fn default_backup_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    Ok(dir.join("backups"))
}

impl Args {
    /// Fills in defaults and checks the work directory is usable.
    pub fn into_config(self) -> Result<Config> {
        let backup_dir = match self.backup_dir {
            Some(dir) => dir,
            None => default_backup_dir()?,
        };
        let work_dir = match self.work_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        if !work_dir.is_dir() {
            return Err(UpdaterError::invalid_target(work_dir, "work directory does not exist"));
        }
        Ok(Config {
            backup_dir,
            work_dir,
            timeout: Duration::from_secs(self.timeout.max(1)),
            firmware_page: self.firmware_page,
            labels_url: self.labels_url,
        })
    }
}

/// Parses command-line arguments using `clap`.
pub fn parse() -> Args {
    Args::parse()
}
