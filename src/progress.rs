use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg} {spinner:.green} [{elapsed_precise}] [{bar:50.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{msg} {spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec})";

/// Receives byte counts while a body is written to disk.
pub trait Progress {
    fn advance(&self, bytes: u64);
    fn finish(&self);
}

/// Reports nothing.
pub struct Silent;

impl Progress for Silent {
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
}

impl Progress for ProgressBar {
    fn advance(&self, bytes: u64) {
        self.inc(bytes);
    }

    fn finish(&self) {
        self.finish_with_message("downloaded");
    }
}

/// Bar sized to `total`, or a spinner when the length is unknown or zero.
pub fn download_bar(total: Option<u64>) -> ProgressBar {
    let pb = match total.filter(|len| *len > 0) {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    };
    pb.set_message("downloading");
    pb
}

pub fn reporter(enabled: bool, total: Option<u64>) -> Box<dyn Progress + Send + Sync> {
    if enabled {
        Box::new(download_bar(total))
    } else {
        Box::new(Silent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_length_follows_content_length() {
        assert_eq!(download_bar(Some(2048)).length(), Some(2048));
        assert_eq!(download_bar(Some(0)).length(), None);
        assert_eq!(download_bar(None).length(), None);
    }

    #[test]
    fn test_bar_counts_bytes() {
        let pb = download_bar(Some(100));
        pb.advance(40);
        pb.advance(2);
        assert_eq!(pb.position(), 42);
        Progress::finish(&pb);
        assert!(pb.is_finished());
    }
}
