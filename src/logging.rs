use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Operator-facing text goes to stdout via the
/// menu, so logs stay on stderr and default to warnings only. `RUST_LOG`
/// overrides the level.
pub fn init(verbose: bool) {
    let default = if verbose { "a3d_updater=debug" } else { "a3d_updater=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
