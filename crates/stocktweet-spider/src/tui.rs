use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar over `len` steps of a backfill; hidden when `tui` is off so that traced
/// runs only print log lines.
pub(crate) fn progress(len: u64, msg: &str, tui: bool) -> ProgressBar {
    if !tui {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.magenta} {msg:>9.white} |{bar:40.cyan/blue}| {pos:<2} / {human_len} \
                [Time: {elapsed}, ETA: {eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("## ");

    let pb = ProgressBar::new(len).with_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spinner for a single step of unknown length.
pub(crate) fn spinner(msg: String, tui: bool) -> ProgressBar {
    if !tui {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::default_spinner()
        .template("{spinner:.magenta} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let pb = ProgressBar::new_spinner().with_message(msg).with_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
