//! Log file housekeeping used by `lib.rs` when it sets up the rolling
//! file appender.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// File name prefix handed to the daily appender.
pub const LOG_PREFIX: &str = "console";

fn is_log_file(name: &str) -> bool {
    name.starts_with(&format!("{LOG_PREFIX}.")) || name == format!("{LOG_PREFIX}.log")
}

/// Prune old log files in `log_dir`, keeping only the most recent
/// `MAX_LOG_FILES`. Returns how many were removed.
pub fn prune_old_logs(log_dir: &Path) -> usize {
    if !log_dir.exists() {
        return 0;
    }

    let mut log_files: Vec<(PathBuf, SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if is_log_file(name) {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = fs::File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    #[test]
    fn keeps_the_newest_log_files() {
        let dir = tempfile::tempdir().unwrap();
        for day in 0..12u64 {
            touch(dir.path(), &format!("console.2024-01-{:02}", day + 1), 86_400 * (12 - day));
        }
        let unrelated = touch(dir.path(), "export.pdf", 10 * 86_400 * 30);

        assert_eq!(prune_old_logs(dir.path()), 2);
        assert!(!dir.path().join("console.2024-01-01").exists());
        assert!(!dir.path().join("console.2024-01-02").exists());
        assert!(dir.path().join("console.2024-01-12").exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn missing_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(prune_old_logs(&dir.path().join("nope")), 0);
    }
}
