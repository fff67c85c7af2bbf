//! Progress reporting for downloads.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Snapshot of a running download.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub url: String,
    pub filename: String,
    pub received: u64,
    /// `Content-Length` if the server sent one.
    pub total: Option<u64>,
    pub elapsed: Duration,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(100.0),
            Some(t) => Some((self.received as f32 / t as f32 * 100.0).min(100.0)),
            None => None,
        }
    }

    pub fn speed_mbps(&self) -> f32 {
        let secs = self.elapsed.as_secs_f32();
        if secs <= 0.0 {
            return 0.0;
        }
        self.received as f32 / (1024.0 * 1024.0) / secs
    }

    pub fn is_complete(&self) -> bool {
        self.total.map_or(false, |t| self.received >= t)
    }
}

/// Progress callback function type
pub type ProgressCallback<'a> = dyn FnMut(&DownloadProgress) + 'a;

/// Builds the status line for a given bar width.
pub fn render_line(state: &DownloadProgress, bar_width: usize) -> String {
    let mb = state.received as f32 / (1024.0 * 1024.0);
    match state.percent() {
        Some(pct) => {
            let filled = ((pct / 100.0) * bar_width as f32) as usize;
            let empty = bar_width.saturating_sub(filled);
            format!(
                "[{}{}] {:.1}% | {:.1} MB | {:.1} MB/s | {}",
                "█".repeat(filled),
                "░".repeat(empty),
                pct,
                mb,
                state.speed_mbps(),
                state.filename
            )
        }
        None => format!("{:.1} MB | {:.1} MB/s | {}", mb, state.speed_mbps(), state.filename),
    }
}

/// Returns a callback that draws a single-line bar on stderr.
/// Redraws at most every 100ms but always draws completion.
pub fn terminal_progress() -> impl FnMut(&DownloadProgress) {
    let mut last_update: Option<Instant> = None;
    let mut done = false;
    move |state: &DownloadProgress| {
        if done {
            return;
        }
        let now = Instant::now();
        let complete = state.is_complete();
        if !complete {
            if let Some(last) = last_update {
                if now.duration_since(last) < Duration::from_millis(100) {
                    return;
                }
            }
        }
        last_update = Some(now);

        let term_width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80);
        let mut bar_width: usize = 40;
        let line = loop {
            let line = render_line(state, bar_width);
            if line.chars().count() <= term_width || bar_width <= 10 {
                break line;
            }
            bar_width -= 4;
        };
        eprint!("\r\x1B[2K{}", line);
        io::stderr().flush().ok();

        if complete {
            eprintln!();
            done = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(received: u64, total: Option<u64>) -> DownloadProgress {
        DownloadProgress {
            url: "https://cdn.example.com/a3d_os_1.bin".into(),
            filename: "a3d_os_1.bin".into(),
            received,
            total,
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn percent_with_and_without_length() {
        assert_eq!(state(50, Some(200)).percent(), Some(25.0));
        assert_eq!(state(50, None).percent(), None);
        assert_eq!(state(0, Some(0)).percent(), Some(100.0));
    }

    #[test]
    fn line_contains_bar_and_name() {
        let line = render_line(&state(100, Some(100)), 10);
        assert!(line.starts_with("[██████████]"));
        assert!(line.contains("100.0%"));
        assert!(line.ends_with("a3d_os_1.bin"));

        let line = render_line(&state(1024 * 1024, None), 10);
        assert!(line.starts_with("1.0 MB"));
    }
}
