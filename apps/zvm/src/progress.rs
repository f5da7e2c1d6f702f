//! Terminal rendering of download progress.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use zvm_core::{ProgressCallback, ProgressEvent};

/// Returns a callback that redraws a single progress line on stdout.
pub fn printer() -> ProgressCallback {
    // 0 means the server did not send a length.
    let total = Arc::new(AtomicU64::new(0));
    Arc::new(move |event: ProgressEvent| match event {
        ProgressEvent::Started { url, total: size } => {
            total.store(size.unwrap_or(0), Ordering::Relaxed);
            println!("Downloading from {url}...");
        }
        ProgressEvent::Progress { downloaded, speed } => {
            let total = Some(total.load(Ordering::Relaxed)).filter(|t| *t > 0);
            print!("\r{}     ", progress_line(downloaded, total, speed));
            let _ = std::io::stdout().flush();
        }
        ProgressEvent::Retrying { attempt, max } => {
            println!();
            println!("Download interrupted, retrying ({attempt}/{max})...");
        }
        ProgressEvent::Completed => println!(),
        ProgressEvent::Failed { error } => {
            println!();
            eprintln!("Download failed: {error}");
        }
    })
}

fn progress_line(downloaded: u64, total: Option<u64>, speed: u64) -> String {
    let speed = format_speed(speed);
    match (total, ProgressEvent::percent(downloaded, total)) {
        (Some(total), Some(percent)) => format!(
            "{}/{} ({percent}%) {speed}",
            format_bytes(downloaded),
            format_bytes(total)
        ),
        _ => format!("{} {speed}", format_bytes(downloaded)),
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats speed (bytes/sec) into a human-readable string.
fn format_speed(speed: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    #[allow(clippy::cast_precision_loss)]
    let speed_f = speed as f64;

    if speed >= MB {
        format!("{:.2} MB/s", speed_f / MB as f64)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed_f / KB as f64)
    } else {
        format!("{speed} B/s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(45 * 1024 * 1024), "45.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn speed_use_binary_units() {
        assert_eq!(format_speed(900), "900 B/s");
        assert_eq!(format_speed(2048), "2.00 KB/s");
        assert_eq!(format_speed(5 * 1024 * 1024), "5.00 MB/s");
    }

    #[test]
    fn line_with_known_total_shows_percent() {
        assert_eq!(
            progress_line(512, Some(1024), 1024),
            "512 B/1.00 KB (50%) 1.00 KB/s"
        );
    }

    #[test]
    fn line_without_total_shows_bytes_only() {
        assert_eq!(progress_line(2048, None, 100), "2.00 KB 100 B/s");
    }
}
