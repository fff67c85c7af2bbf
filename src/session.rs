//! Interactive menu driving the installer, backup and restore steps.
//!
//! All state lives in [`Session`]: the resolved [`Config`], a [`Backend`] for
//! everything that touches the network or the host's mount table, and the
//! input/output streams. Tests drive a whole session through byte buffers and a
//! fake backend.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use tracing::info;

use crate::archive;
use crate::cli::Config;
use crate::error::{Result, UpdaterError};
use crate::extract::{self, RestoreConfirmation, CONFIRM_WORD};
use crate::fetch::{self, LocalArtifact};
use crate::fsx;
use crate::install;
use crate::progress;
use crate::remote::{self, RemoteArtifact};
use crate::volume::{self, VolumeCandidate};

/// Everything a session needs from the outside world.
pub trait Backend {
    fn resolve_firmware(&self) -> Result<RemoteArtifact>;
    fn resolve_labels_database(&self) -> Result<RemoteArtifact>;
    fn fetch(&self, artifact: &RemoteArtifact, dest_dir: &Path) -> Result<LocalArtifact>;
    fn volume_candidates(&self) -> Vec<VolumeCandidate>;
}

/// Real network and real mount table.
pub struct LiveBackend {
    client: Client,
    firmware_page: String,
    labels_url: String,
}

impl LiveBackend {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: fetch::http_client(config.timeout)?,
            firmware_page: config.firmware_page.clone(),
            labels_url: config.labels_url.clone(),
        })
    }
}

impl Backend for LiveBackend {
    fn resolve_firmware(&self) -> Result<RemoteArtifact> {
        remote::resolve_firmware(&self.client, &self.firmware_page)
    }

    fn resolve_labels_database(&self) -> Result<RemoteArtifact> {
        remote::resolve_labels_database(&self.labels_url)
    }

    fn fetch(&self, artifact: &RemoteArtifact, dest_dir: &Path) -> Result<LocalArtifact> {
        let mut bar = progress::terminal_progress();
        fetch::fetch(&self.client, artifact, dest_dir, Some(&mut bar))
    }

    fn volume_candidates(&self) -> Vec<VolumeCandidate> {
        volume::list_candidates()
    }
}

/// Top-level menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    InstallAll,
    InstallLabels,
    UpdateFirmware,
    CreateBackup,
    RestoreBackup,
    Quit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 6] = [
        MenuChoice::InstallAll,
        MenuChoice::InstallLabels,
        MenuChoice::UpdateFirmware,
        MenuChoice::CreateBackup,
        MenuChoice::RestoreBackup,
        MenuChoice::Quit,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MenuChoice::InstallAll => "1",
            MenuChoice::InstallLabels => "2",
            MenuChoice::UpdateFirmware => "3",
            MenuChoice::CreateBackup => "4",
            MenuChoice::RestoreBackup => "5",
            MenuChoice::Quit => "0",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL.into_iter().find(|c| c.key() == input)
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::InstallAll => "Install firmware + cartridge labels",
            MenuChoice::InstallLabels => "Install cartridge labels only",
            MenuChoice::UpdateFirmware => "Update firmware only",
            MenuChoice::CreateBackup => "Back up Library and Settings",
            MenuChoice::RestoreBackup => "Restore a backup",
            MenuChoice::Quit => "Quit",
        };
        f.write_str(label)
    }
}

pub struct Session<R, W, B> {
    config: Config,
    backend: B,
    input: R,
    out: W,
}

impl<R: BufRead, W: Write, B: Backend> Session<R, W, B> {
    pub fn new(config: Config, backend: B, input: R, out: W) -> Self {
        Self { config, backend, input, out }
    }

    /// Runs the menu until the operator quits or input ends. Only failures of
    /// the terminal itself are returned; action failures are reported and the
    /// menu shown again.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.print_menu()?;
            let Some(line) = self.prompt("\nChoose an option: ")? else {
                break;
            };
            let Some(choice) = MenuChoice::parse(&line) else {
                writeln!(self.out, "Unknown option '{}'.", line.trim())?;
                continue;
            };
            info!(?choice, "menu");
            let outcome = match choice {
                MenuChoice::Quit => break,
                MenuChoice::InstallAll => self.install(true, true),
                MenuChoice::InstallLabels => self.install(false, true),
                MenuChoice::UpdateFirmware => self.install(true, false),
                MenuChoice::CreateBackup => self.backup(),
                MenuChoice::RestoreBackup => self.restore(),
            };
            if let Err(e) = outcome {
                self.report_error(&e)?;
            }
        }
        writeln!(self.out, "Bye.")?;
        Ok(())
    }

    fn print_menu(&mut self) -> Result<()> {
        writeln!(self.out, "\n=== Analogue 3D SD card tool ===")?;
        for choice in MenuChoice::ALL {
            writeln!(self.out, "  {}) {}", choice.key(), choice)?;
        }
        Ok(())
    }

    fn report_error(&mut self, e: &UpdaterError) -> Result<()> {
        match e {
            UpdaterError::NotFound { page } => {
                writeln!(self.out, "Error: could not find the download link on the page.")?;
                writeln!(self.out, "The site layout may have changed, check manually at:")?;
                writeln!(self.out, "{}", page)?;
            }
            other => writeln!(self.out, "Error: {}", other)?,
        }
        Ok(())
    }

    /// Prints `msg` and reads one line. `None` at end of input. Bytes that are
    /// not UTF-8 are replaced rather than rejected.
    fn prompt(&mut self, msg: &str) -> Result<Option<String>> {
        write!(self.out, "{}", msg)?;
        self.out.flush()?;
        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).trim().to_string()))
    }

    /// Lets the operator pick a detected volume or type a path, then checks it.
    fn select_volume(&mut self) -> Result<Option<PathBuf>> {
        writeln!(self.out, "\nLooking for SD cards / removable drives...")?;
        let drives = self.backend.volume_candidates();
        let manual_prompt = "Enter full path to SD card root (e.g. E:\\ or /Volumes/NO_NAME/): ";

        let target = if drives.is_empty() {
            writeln!(self.out, "No removable drives detected automatically.")?;
            self.prompt(manual_prompt)?
        } else {
            writeln!(self.out, "Found possible SD cards:")?;
            for (i, drive) in drives.iter().enumerate() {
                writeln!(self.out, "  {}) {} ({} GB free)", i + 1, drive.mount_path, drive.free_gib)?;
            }
            writeln!(self.out, "  0) Enter path manually")?;
            let Some(choice) = self.prompt("\nSelect your SD card (number): ")? else {
                return Ok(None);
            };
            if choice == "0" {
                self.prompt(manual_prompt)?
            } else {
                match choice.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| drives.get(i)) {
                    Some(drive) => Some(drive.mount_path.clone()),
                    None => {
                        writeln!(self.out, "Invalid selection.")?;
                        return Ok(None);
                    }
                }
            }
        };

        let Some(target) = target.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let root = PathBuf::from(target);
        fsx::ensure_writable_dir(&root)?;
        Ok(Some(root))
    }

    fn download(&mut self, artifact: &RemoteArtifact) -> Result<LocalArtifact> {
        writeln!(self.out, "Downloading {}...", artifact.filename)?;
        self.out.flush()?;
        let local = self.backend.fetch(artifact, &self.config.work_dir)?;
        writeln!(self.out, "Downloaded to {}", local.path.display())?;
        Ok(local)
    }

    fn install(&mut self, firmware: bool, labels: bool) -> Result<()> {
        let firmware_file = if firmware {
            writeln!(self.out, "Fetching latest firmware info from Analogue...")?;
            let artifact = self.backend.resolve_firmware()?;
            writeln!(self.out, "Latest firmware: {}", artifact.filename)?;
            Some(self.download(&artifact)?)
        } else {
            None
        };
        let labels_file = if labels {
            let artifact = self.backend.resolve_labels_database()?;
            Some(self.download(&artifact)?)
        } else {
            None
        };

        let Some(root) = self.select_volume()? else {
            writeln!(self.out, "No SD card selected.")?;
            return Ok(());
        };

        if let Some(local) = &firmware_file {
            writeln!(self.out, "\nCopying {} to {} ...", local.filename(), root.display())?;
            let report = install::install_firmware(local, &root)?;
            writeln!(self.out, "Removing any old Analogue 3D firmware files...")?;
            for name in &report.removed {
                writeln!(self.out, "  Removed {}", name)?;
            }
            for name in &report.failed {
                writeln!(self.out, "  Could not remove {}", name)?;
            }
            if report.removed.is_empty() && report.failed.is_empty() {
                writeln!(self.out, "  No old firmware files found.")?;
            }
        }
        if let Some(local) = &labels_file {
            let dest = install::install_labels_database(local, &root)?;
            writeln!(self.out, "Installed cartridge labels to {}", dest.display())?;
        }

        writeln!(self.out, "\nAll done!")?;
        writeln!(self.out, "You can now safely eject the SD card.")?;
        if firmware_file.is_some() {
            writeln!(self.out, "(Hold Pairing button + Power to install the update.)")?;
        }
        Ok(())
    }

    fn backup(&mut self) -> Result<()> {
        let Some(root) = self.select_volume()? else {
            writeln!(self.out, "No SD card selected.")?;
            return Ok(());
        };
        let folders = archive::backup_folders(&root)?;
        if folders.is_empty() {
            writeln!(self.out, "No Library or Settings folder found; the backup will be empty.")?;
        } else {
            writeln!(self.out, "Backing up {} ...", folders.join(", "))?;
        }
        let created = archive::create_backup(&root, &self.config.backup_dir)?;
        writeln!(self.out, "Backup saved to {}", created.path.display())?;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        let backups = extract::list_backups(&self.config.backup_dir)?;
        if backups.is_empty() {
            writeln!(self.out, "No backups found in {}", self.config.backup_dir.display())?;
            return Ok(());
        }
        writeln!(self.out, "\nAvailable backups:")?;
        for (i, b) in backups.iter().enumerate() {
            writeln!(self.out, "  {}) {}", i + 1, b.file_name())?;
        }
        let Some(choice) = self.prompt("\nSelect a backup (number): ")? else {
            return Ok(());
        };
        let Some(selected) = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| backups.get(i))
        else {
            writeln!(self.out, "Invalid selection.")?;
            return Ok(());
        };
        let selected = selected.clone();

        let Some(root) = self.select_volume()? else {
            writeln!(self.out, "No SD card selected.")?;
            return Ok(());
        };
        let entries = archive::list_entries(&selected.path)?;
        writeln!(
            self.out,
            "\n{} holds {} entries. Existing files at the same paths on {} will be overwritten.",
            selected.file_name(),
            entries.len(),
            root.display()
        )?;
        let answer = self
            .prompt(&format!("Type {} to continue: ", CONFIRM_WORD))?
            .unwrap_or_default();
        let confirmation = match RestoreConfirmation::parse(&answer) {
            Ok(c) => c,
            Err(_) => {
                writeln!(self.out, "Restore cancelled.")?;
                return Ok(());
            }
        };
        let report = extract::restore(&selected, &root, &confirmation)?;
        writeln!(
            self.out,
            "Restored {} files and {} folders.",
            report.files, report.directories
        )?;
        if !report.skipped.is_empty() {
            writeln!(self.out, "Skipped {} unsafe entries.", report.skipped.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_keys_parse() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::InstallAll));
        assert_eq!(MenuChoice::parse(" 5 "), Some(MenuChoice::RestoreBackup));
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Quit));
        assert_eq!(MenuChoice::parse("6"), None);
        assert_eq!(MenuChoice::parse("quit"), None);
    }
}
