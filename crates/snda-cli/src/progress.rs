//! Progress bars for transfers

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use snda_client::ClientError;
use snda_transfer::{EventKind, TransferEvent, TransferObserver};

const TRANSFER_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";

/// Create a progress bar for a file transfer
pub fn create_transfer_progress(total_bytes: u64, filename: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    pb.set_style(
        ProgressStyle::with_template(TRANSFER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(filename.to_string());
    pb
}

/// Drives a progress bar from transfer events
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self::new(ProgressBar::hidden())
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl<O> TransferObserver<O, ClientError> for ProgressObserver {
    fn on_event(&mut self, event: &TransferEvent<O, ClientError>) {
        let watcher = event.watcher();
        match event.kind() {
            EventKind::Started => {
                if let Some(total) = watcher.bytes_total {
                    self.bar.set_length(total);
                }
            }
            EventKind::InProgress(_) => self.bar.set_position(watcher.bytes_transferred),
            EventKind::IgnoredErrors(failures) => {
                for failure in failures {
                    let label = if failure.abandoned { "gave up" } else { "retry" };
                    self.bar.println(format!(
                        "{} {} (attempt {}): {}",
                        label.yellow(),
                        failure.unit.id(),
                        failure.unit.attempt(),
                        failure.error
                    ));
                }
            }
            EventKind::Completed { .. } => {
                self.bar.set_position(watcher.bytes_transferred);
                self.bar.finish_with_message("done");
            }
            EventKind::Cancelled(_) => self.bar.abandon_with_message("cancelled"),
            EventKind::Error(_) => self.bar.abandon_with_message("failed"),
        }
    }
}

/// Format bytes as human readable string
pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Format duration as human readable string
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
