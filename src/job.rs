//! Job State
//!
//! Written only by the job's own engine, read by anyone holding the job.

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::JobError;

pub type JobId = Uuid;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub current_slice: Option<u32>,
    pub total_slices: Option<u32>,
    pub exposure_time_ms: Option<u64>,
    pub exposure_overridden: bool,
    pub current_slice_time_ms: Option<u64>,
    pub z_lift_speed: Option<f64>,
    pub z_lift_distance: Option<f64>,
}

/// Read-only copy of a job handed to status observers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    pub job_file: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub progress: JobProgress,
}

#[derive(Debug)]
pub struct PrintJob {
    id: JobId,
    job_file: PathBuf,
    created_at: DateTime<Utc>,
    progress: RwLock<JobProgress>,
    interrupted: Mutex<bool>,
    wake: Condvar,
}

impl PrintJob {
    pub fn new(job_file: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_file: job_file.into(),
            created_at: Utc::now(),
            progress: RwLock::new(JobProgress::default()),
            interrupted: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn job_file(&self) -> &Path {
        &self.job_file
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn progress(&self) -> JobProgress {
        self.progress.read().clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            job_file: self.job_file.clone(),
            created_at: self.created_at,
            progress: self.progress(),
        }
    }

    /// Fix the exposure time; delay markers in the command file are then ignored.
    pub fn override_exposure(&self, ms: u64) {
        let mut progress = self.progress.write();
        progress.exposure_time_ms = Some(ms);
        progress.exposure_overridden = true;
    }

    pub fn clear_exposure_override(&self) {
        self.progress.write().exposure_overridden = false;
    }

    /// Wake an in-flight exposure delay early. Has no effect on a delay
    /// that starts after the call.
    pub fn interrupt_exposure(&self) {
        *self.interrupted.lock() = true;
        self.wake.notify_all();
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut JobProgress)) {
        let mut progress = self.progress.write();
        f(&mut *progress);
    }

    /// Duration to expose for a `<Delay> ms` marker. Records `ms` as the
    /// exposure time unless the user has overridden it.
    pub(crate) fn exposure_for(&self, ms: u64) -> Duration {
        let mut progress = self.progress.write();
        match (progress.exposure_overridden, progress.exposure_time_ms) {
            (true, Some(overridden)) => Duration::from_millis(overridden),
            _ => {
                progress.exposure_time_ms = Some(ms);
                Duration::from_millis(ms)
            }
        }
    }

    /// Block for `duration` unless `interrupt_exposure` is called meanwhile.
    pub(crate) fn expose(&self, duration: Duration) -> Result<(), JobError> {
        let started = Instant::now();
        let deadline = started + duration;
        let mut interrupted = self.interrupted.lock();
        *interrupted = false;

        while !*interrupted {
            if self.wake.wait_until(&mut interrupted, deadline).timed_out() {
                return Ok(());
            }
        }

        *interrupted = false;
        Err(JobError::InterruptedDelay {
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
