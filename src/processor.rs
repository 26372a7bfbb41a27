//! Print File Processor
//!
//! Entry point a job owner uses: stage the archive, run it, clean up.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, info_span};

use crate::config::HostConfig;
use crate::display::SliceImage;
use crate::engine::SceneEngine;
use crate::error::JobError;
use crate::job::{JobId, JobProgress, PrintJob};
use crate::notify::NotificationSink;
use crate::printer::{JobStatus, Printer};
use crate::staging::ArchiveStager;

/// Terminal result of one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
    pub progress: JobProgress,
}

impl JobReport {
    pub fn finished(job: &PrintJob, status: JobStatus) -> Self {
        Self {
            job_id: job.id(),
            status,
            error: None,
            finished_at: Utc::now(),
            progress: job.progress(),
        }
    }

    pub fn failed(job: &PrintJob, cause: impl Display) -> Self {
        Self {
            job_id: job.id(),
            status: JobStatus::Failed,
            error: Some(cause.to_string()),
            finished_at: Utc::now(),
            progress: job.progress(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }
}

pub trait PrintFileProcessor: Send + Sync {
    fn file_extensions(&self) -> &[String];

    fn accepts_file(&self, path: &Path) -> bool;

    /// Image currently projected for `job`, if any.
    fn current_image(&self, job: &PrintJob) -> Option<Arc<SliceImage>>;

    fn prepare_environment(&self, archive: &Path) -> Result<PathBuf, JobError>;

    fn cleanup_environment(&self, archive: &Path) -> Result<(), JobError>;

    /// Run a prepared job. Failures come back as a `Failed` report.
    fn process_file(&self, job: &PrintJob, printer: &dyn Printer) -> JobReport;
}

pub struct SceneFileProcessor {
    config: HostConfig,
    stager: ArchiveStager,
    engine: SceneEngine,
}

impl SceneFileProcessor {
    pub fn new(config: HostConfig, notifier: Arc<dyn NotificationSink>) -> Self {
        let engine = SceneEngine::new(notifier, config.motion_attempts, config.image_extension.clone());
        Self {
            stager: ArchiveStager::new(config.clone()),
            config,
            engine,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn stager(&self) -> &ArchiveStager {
        &self.stager
    }

    pub fn engine(&self) -> &SceneEngine {
        &self.engine
    }
}

impl PrintFileProcessor for SceneFileProcessor {
    fn file_extensions(&self) -> &[String] {
        &self.config.archive_extensions
    }

    fn accepts_file(&self, path: &Path) -> bool {
        self.stager.accepts(path)
    }

    fn current_image(&self, job: &PrintJob) -> Option<Arc<SliceImage>> {
        self.engine.current_image(job.id())
    }

    fn prepare_environment(&self, archive: &Path) -> Result<PathBuf, JobError> {
        self.stager.prepare(archive)
    }

    fn cleanup_environment(&self, archive: &Path) -> Result<(), JobError> {
        self.stager.cleanup(archive)
    }

    fn process_file(&self, job: &PrintJob, printer: &dyn Printer) -> JobReport {
        let span = info_span!("job", id = %job.id(), printer = printer.name());
        let _enter = span.enter();

        let dir = self.stager.working_dir(job.job_file());
        let result = self
            .stager
            .locate_command_file(&dir)
            .and_then(|command_file| self.engine.run(job, printer, &command_file));

        match result {
            Ok(status) => {
                info!(?status, "job finished");
                JobReport::finished(job, status)
            }
            Err(e) => {
                error!(error = %e, "job failed");
                JobReport::failed(job, e)
            }
        }
    }
}
