use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_cli_menu_quit_exits_cleanly() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let backups = tempdir()?;

    let mut cmd = Command::cargo_bin("a3d-updater")?;
    cmd.arg("--work-dir")
        .arg(work.path())
        .arg("--backup-dir")
        .arg(backups.path())
        .write_stdin("0\n");
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("1) Install firmware + cartridge labels")
                .and(predicate::str::contains("5) Restore a backup"))
                .and(predicate::str::contains("Bye.")),
        );
    Ok(())
}

#[test]
fn test_cli_restore_lists_nothing_for_empty_backup_dir() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let backups = tempdir()?;

    let mut cmd = Command::cargo_bin("a3d-updater")?;
    cmd.arg("--work-dir")
        .arg(work.path())
        .arg("--backup-dir")
        .arg(backups.path())
        .write_stdin("5\n0\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No backups found in"));
    Ok(())
}

#[test]
fn test_cli_missing_work_dir_is_setup_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let mut cmd = Command::cargo_bin("a3d-updater")?;
    cmd.arg("--work-dir").arg(dir.path().join("missing")).write_stdin("0\n");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("work directory does not exist"));
    Ok(())
}
