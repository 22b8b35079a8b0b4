//! Retention sweeping of generated audio artifacts.
//!
//! ## Behaviour:
//! - Only active in production mode; a no-op otherwise
//! - At most one sweep runs at a time; a sweep requested while another is in
//!   flight is skipped, not queued
//! - Files whose age exceeds the retention window are deleted; a failure on
//!   one file is logged and the sweep moves on
//! - Nothing is ever surfaced to the request that triggered the sweep

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

use crate::config::DeploymentMode;

/// Counts from a completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files looked at
    pub examined: usize,
    pub deleted: usize,
    /// Files that could not be inspected or removed
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Not in production mode
    Disabled,
    /// Another sweep held the latch
    Skipped,
    /// The audio directory could not be listed
    Aborted(String),
    Completed(SweepReport),
}

pub struct RetentionSweeper {
    audio_dir: PathBuf,
    max_age: Duration,
    enabled: bool,
    in_progress: AtomicBool,
}

/// Holds the single-flight latch; releasing happens on drop so every exit
/// path, including a panic inside the sweep, frees it.
struct SweepGuard<'a> {
    latch: &'a AtomicBool,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.latch.store(false, Ordering::Release);
    }
}

impl RetentionSweeper {
    pub fn new(audio_dir: PathBuf, max_age: Duration, mode: DeploymentMode) -> Self {
        Self {
            audio_dir,
            max_age,
            enabled: mode.is_production(),
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn try_acquire(&self) -> Option<SweepGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepGuard {
                latch: &self.in_progress,
            })
    }

    /// Start a sweep in the background without waiting for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(self: &Arc<Self>) {
        if !self.enabled {
            return;
        }

        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = sweeper.sweep().await;
            debug!(op = "sonify.sweep", outcome = ?outcome, "Background sweep finished");
        });
    }

    /// Run one sweep now, measuring ages against the current time.
    pub async fn sweep(&self) -> SweepOutcome {
        self.sweep_at(SystemTime::now()).await
    }

    /// Run one sweep, measuring ages against `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepOutcome {
        if !self.enabled {
            return SweepOutcome::Disabled;
        }

        let Some(_guard) = self.try_acquire() else {
            debug!(op = "sonify.sweep", "Sweep already in progress; skipping");
            return SweepOutcome::Skipped;
        };

        let mut entries = match tokio::fs::read_dir(&self.audio_dir).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(
                    op = "sonify.sweep",
                    audio_dir = %self.audio_dir.display(),
                    error = %err,
                    "Error during cleanup: cannot list audio directory"
                );
                return SweepOutcome::Aborted(err.to_string());
            }
        };

        let mut report = SweepReport::default();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(op = "sonify.sweep", error = %err, "Failed to read directory entry");
                    report.failed += 1;
                    break;
                }
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(op = "sonify.sweep", file = %path.display(), error = %err, "Error processing file");
                    report.failed += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            report.examined += 1;

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(err) => {
                    warn!(op = "sonify.sweep", file = %path.display(), error = %err, "Error processing file");
                    report.failed += 1;
                    continue;
                }
            };

            // Timestamps in the future count as brand new
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(
                        op = "sonify.sweep",
                        file = %path.display(),
                        age_secs = age.as_secs(),
                        "Deleted old audio file"
                    );
                    report.deleted += 1;
                }
                Err(err) => {
                    warn!(op = "sonify.sweep", file = %path.display(), error = %err, "Error deleting file");
                    report.failed += 1;
                }
            }
        }

        info!(
            op = "sonify.sweep",
            examined = report.examined,
            deleted = report.deleted,
            failed = report.failed,
            "Sweep completed"
        );
        SweepOutcome::Completed(report)
    }
}
