//! Run-level progress: files done out of files planned, plus byte totals.

use std::time::{Duration, Instant};

/// Snapshot of an install run's progress
#[derive(Debug, Clone)]
pub struct RunProgress {
    /// Files in the transfer plan
    pub total_files: usize,

    /// Files fetched so far
    pub completed_files: usize,

    /// Sum of declared sizes in the plan (0 when unknown)
    pub total_bytes: u64,

    /// Bytes actually written so far
    pub transferred_bytes: u64,

    pub current_file: Option<String>,
}

impl RunProgress {
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            total_files,
            completed_files: 0,
            total_bytes,
            transferred_bytes: 0,
            current_file: None,
        }
    }

    /// Label shown next to the progress bar for the file in flight
    pub fn label(&self) -> String {
        match &self.current_file {
            Some(name) => format!("Downloading {}", name),
            None => "Preparing...".to_string(),
        }
    }
}

/// Wraps [`RunProgress`] with the run's start time
pub struct ProgressTracker {
    start_time: Instant,
    progress: RunProgress,
}

impl ProgressTracker {
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            start_time: Instant::now(),
            progress: RunProgress::new(total_files, total_bytes),
        }
    }

    pub fn begin_file(&mut self, name: &str) -> &RunProgress {
        self.progress.current_file = Some(name.to_string());
        &self.progress
    }

    pub fn finish_file(&mut self, bytes: u64) -> &RunProgress {
        self.progress.completed_files += 1;
        self.progress.transferred_bytes += bytes;
        self.progress.current_file = None;
        &self.progress
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn progress(&self) -> &RunProgress {
        &self.progress
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_progress_counts_files() {
        let mut tracker = ProgressTracker::new(4, 400);
        assert_eq!(tracker.progress().completed_files, 0);

        tracker.begin_file("foo-1.0.jar");
        assert_eq!(tracker.progress().label(), "Downloading foo-1.0.jar");

        let progress = tracker.finish_file(100);
        assert_eq!(progress.completed_files, 1);
        assert_eq!(progress.transferred_bytes, 100);
        assert_eq!(progress.total_files, 4);
        assert!(progress.current_file.is_none());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1024 * 1024), "1.00 MB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3665), "1h 1m");
    }
}
