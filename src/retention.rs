//! Storage usage measurement and oldest-first eviction.
//!
//! The budget check works in whole megabytes while the eviction target works
//! in whole kilobytes, so usage after eviction is approximate, not exact.

use crate::constants::{BYTES_PER_KB, BYTES_PER_MB};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("Cannot list storage directory '{path}': {source}")]
    List {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Cannot delete '{path}': {source}")]
    Delete {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Result of measuring the storage directory.
#[derive(Debug)]
pub enum Usage {
    Measured(u64),
    /// The directory could not be enumerated; counts as exactly the budget.
    Unavailable { sentinel_mb: u64, error: RetentionError },
}

impl Usage {
    pub fn megabytes(&self) -> u64 {
        match self {
            Usage::Measured(mb) => *mb,
            Usage::Unavailable { sentinel_mb, .. } => *sentinel_mb,
        }
    }

    pub fn error(&self) -> Option<&RetentionError> {
        match self {
            Usage::Measured(_) => None,
            Usage::Unavailable { error, .. } => Some(error),
        }
    }
}

#[derive(Debug)]
pub struct Enforcement {
    pub usage: Usage,
    pub evicted: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    path: PathBuf,
    created: SystemTime,
    size: u64,
}

/// Regular files directly under `dir`, in enumeration order.
fn list_files(dir: &Path) -> Result<Vec<StoredFile>, RetentionError> {
    let list_err = |source| RetentionError::List {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            // Removed by someone else mid-listing.
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(list_err(err)),
        };
        if !metadata.is_file() {
            continue;
        }
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(StoredFile {
            path: entry.path(),
            created,
            size: metadata.len(),
        });
    }
    Ok(files)
}

/// Total size of the files directly under `dir`, in whole megabytes.
///
/// When the directory cannot be read the usage is reported as `budget_mb`,
/// which makes the following eviction decision a no-op.
pub fn measure_usage(dir: &Path, budget_mb: u64) -> Usage {
    match list_files(dir) {
        Ok(files) => {
            let bytes: u64 = files.iter().map(|f| f.size).sum();
            Usage::Measured(bytes / BYTES_PER_MB)
        }
        Err(error) => Usage::Unavailable {
            sentinel_mb: budget_mb,
            error,
        },
    }
}

/// Delete the oldest files in `dir` until usage is back within `budget_mb`.
pub fn enforce_budget(dir: &Path, budget_mb: u64) -> Result<Enforcement, RetentionError> {
    let usage = measure_usage(dir, budget_mb);
    let usage_mb = usage.megabytes();
    if usage_mb <= budget_mb {
        debug!(usage_mb, budget_mb, "Storage within budget");
        return Ok(Enforcement {
            usage,
            evicted: Vec::new(),
        });
    }

    let excess_kb = ((usage_mb - budget_mb) * 1024) as i64;
    info!(usage_mb, budget_mb, excess_kb, "Storage over budget, clearing");

    let mut files = list_files(dir)?;
    files.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));

    let evicted = evict_oldest(&files, excess_kb)?;
    Ok(Enforcement { usage, evicted })
}

/// `files` must already be ordered oldest first.
fn evict_oldest(files: &[StoredFile], mut excess_kb: i64) -> Result<Vec<PathBuf>, RetentionError> {
    let mut evicted = Vec::new();
    for file in files {
        match fs::remove_file(&file.path) {
            Ok(()) => debug!(path = ?file.path, size = file.size, "Evicted"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = ?file.path, "Already gone")
            }
            Err(source) => {
                return Err(RetentionError::Delete {
                    path: file.path.display().to_string(),
                    source,
                })
            }
        }
        evicted.push(file.path.clone());
        excess_kb -= (file.size / BYTES_PER_KB) as i64;
        if excess_kb <= 0 {
            break;
        }
    }
    Ok(evicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::thread;
    use std::time::Duration;

    const KB: usize = 1024;

    /// Creates files in order so that creation times increase with the list.
    fn write_files(temp: &assert_fs::TempDir, files: &[(&str, usize)]) {
        for (name, kb) in files {
            temp.child(name).write_binary(&vec![0u8; kb * KB]).unwrap();
            thread::sleep(Duration::from_millis(15));
        }
    }

    fn remaining(temp: &assert_fs::TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn empty_directory_measures_zero() {
        let temp = assert_fs::TempDir::new().unwrap();
        let usage = measure_usage(temp.path(), 5);
        assert!(matches!(usage, Usage::Measured(0)));
    }

    #[test]
    fn missing_directory_reports_the_budget() {
        let temp = assert_fs::TempDir::new().unwrap();
        let usage = measure_usage(&temp.path().join("absent"), 7);
        assert_eq!(usage.megabytes(), 7);
        assert!(matches!(usage.error(), Some(RetentionError::List { .. })));
    }

    #[test]
    fn measurement_truncates_and_skips_subdirectories() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("a.png", 1100), ("b.png", 900)]);
        let nested = temp.child("nested");
        nested.create_dir_all().unwrap();
        nested
            .child("big.png")
            .write_binary(&vec![0u8; 4 * 1024 * KB])
            .unwrap();

        // 2000 KB truncates to 1 MB; the nested 4 MB is not counted.
        assert_eq!(measure_usage(temp.path(), 0).megabytes(), 1);
    }

    #[test]
    fn evicts_oldest_until_excess_is_cleared() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("a.png", 700), ("b.png", 700), ("c.png", 700)]);

        let outcome = enforce_budget(temp.path(), 1).unwrap();
        assert_eq!(outcome.usage.megabytes(), 2);
        assert_eq!(outcome.evicted.len(), 2);
        assert!(outcome.evicted[0].ends_with("a.png"));
        assert!(outcome.evicted[1].ends_with("b.png"));
        assert_eq!(remaining(&temp), vec!["c.png"]);
        assert!(measure_usage(temp.path(), 1).megabytes() <= 1);
    }

    #[test]
    fn usage_equal_to_budget_deletes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("a.png", 1100), ("b.png", 1100)]);

        let outcome = enforce_budget(temp.path(), 2).unwrap();
        assert_eq!(outcome.usage.megabytes(), 2);
        assert!(outcome.evicted.is_empty());
        assert_eq!(remaining(&temp), vec!["a.png", "b.png"]);
    }

    #[test]
    fn second_enforcement_is_a_no_op() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(
            &temp,
            &[("a.png", 600), ("b.png", 600), ("c.png", 600), ("d.png", 600)],
        );

        let first = enforce_budget(temp.path(), 1).unwrap();
        assert!(!first.evicted.is_empty());
        let after_first = remaining(&temp);

        let second = enforce_budget(temp.path(), 1).unwrap();
        assert!(second.evicted.is_empty());
        assert_eq!(remaining(&temp), after_first);
    }

    #[test]
    fn retained_files_are_never_older_than_evicted_ones() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(
            &temp,
            &[
                ("2024_01_01__00_00_01.png", 400),
                ("2024_01_01__00_00_02.png", 400),
                ("2024_01_01__00_00_03.png", 400),
                ("2024_01_01__00_00_04.png", 400),
                ("2024_01_01__00_00_05.png", 400),
                ("2024_01_01__00_00_06.png", 400),
            ],
        );

        // 2400 KB -> 2 MB, budget 1 MB, excess 1024 KB -> three 400 KB files go.
        let outcome = enforce_budget(temp.path(), 1).unwrap();
        assert_eq!(outcome.evicted.len(), 3);
        assert_eq!(
            remaining(&temp),
            vec![
                "2024_01_01__00_00_04.png",
                "2024_01_01__00_00_05.png",
                "2024_01_01__00_00_06.png",
            ]
        );
    }

    #[test]
    fn stops_when_files_run_out() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("a.png", 2100)]);

        // Budget 0 wants 2048 KB gone; deleting the only file is all it can do.
        let outcome = enforce_budget(temp.path(), 0).unwrap();
        assert_eq!(outcome.evicted.len(), 1);
        assert!(remaining(&temp).is_empty());
    }

    #[test]
    fn missing_directory_is_left_alone() {
        let temp = assert_fs::TempDir::new().unwrap();
        let outcome = enforce_budget(&temp.path().join("absent"), 3).unwrap();
        assert!(outcome.usage.error().is_some());
        assert!(outcome.evicted.is_empty());
    }

    #[test]
    fn creation_time_outranks_file_name() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("z.png", 700), ("y.png", 700), ("x.png", 700)]);

        let outcome = enforce_budget(temp.path(), 1).unwrap();
        assert_eq!(outcome.evicted.len(), 2);
        assert!(outcome.evicted[0].ends_with("z.png"));
        assert!(outcome.evicted[1].ends_with("y.png"));
        assert_eq!(remaining(&temp), vec!["x.png"]);
    }

    #[test]
    fn delete_failure_stops_eviction() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("b.png", 700)]);
        let stuck = temp.child("a.png");
        stuck.create_dir_all().unwrap();

        let files = vec![
            StoredFile {
                path: stuck.path().to_path_buf(),
                created: SystemTime::UNIX_EPOCH,
                size: 700 * KB as u64,
            },
            StoredFile {
                path: temp.child("b.png").path().to_path_buf(),
                created: SystemTime::now(),
                size: 700 * KB as u64,
            },
        ];

        let result = evict_oldest(&files, 1024);
        assert!(matches!(result, Err(RetentionError::Delete { .. })));
        assert!(stuck.path().is_dir());
        assert!(temp.child("b.png").path().exists());
    }

    #[test]
    fn vanished_file_counts_as_evicted() {
        let temp = assert_fs::TempDir::new().unwrap();
        write_files(&temp, &[("a.png", 700), ("b.png", 700)]);
        let mut files = list_files(temp.path()).unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        fs::remove_file(&files[0].path).unwrap();

        let evicted = evict_oldest(&files, 1024).unwrap();
        assert_eq!(evicted.len(), 2);
        assert!(remaining(&temp).is_empty());
    }
}
