//! Main entry point for the a3d-updater CLI app

use std::io;

use a3d_updater::cli;
use a3d_updater::logging;
use a3d_updater::session::{LiveBackend, Session};

fn main() -> std::process::ExitCode {
    if let Err(e) = run_app() {
        eprintln!("Error: {}", e);
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run_app() -> a3d_updater::Result<()> {
    let args = cli::parse();
    logging::init(args.verbose);

    let config = args.into_config()?;
    let backend = LiveBackend::new(&config)?;
    let stdin = io::stdin();
    let mut session = Session::new(config, backend, stdin.lock(), io::stdout());
    session.run()
}
