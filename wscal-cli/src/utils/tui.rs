use indicatif::{ProgressBar, ProgressStyle};
use wscal_core::sync::{SyncPhase, SyncProgress};

pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["-", "\\", "|", "/"])
        .template("{msg} {spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Bar driven by sync progress reports; hidden once the sync completes.
pub fn create_sync_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{msg:>8} [{bar:30}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

/// Apply one progress report to `bar`.
pub fn show_sync_progress(bar: &ProgressBar, progress: &SyncProgress) {
    if progress.phase == SyncPhase::Complete {
        bar.finish_and_clear();
        return;
    }

    bar.set_message(progress.phase.to_string());
    bar.set_length(progress.total as u64);
    bar.set_position(progress.current as u64);
}
