//! Progress bars for the verbose pipeline. Hidden bars cost nothing, so
//! callers always get a `ProgressBar` and never branch on verbosity.

use indicatif::{ProgressBar, ProgressStyle};

/// Bar counting bytes (download, extraction).
pub fn bytes_bar(total: u64, message: &str, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "  {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
    ) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(message.to_string());
    bar
}

/// Bar counting items (breed folders, images).
pub fn items_bar(total: u64, message: &str, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "  {spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}",
    ) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(message.to_string());
    bar
}
