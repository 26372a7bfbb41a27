//! Job Runner
//!
//! Each job runs on its own blocking worker. A semaphore caps how many run
//! at once; extra submissions wait for a slot.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::job::PrintJob;
use crate::printer::Printer;
use crate::processor::{JobReport, PrintFileProcessor};

pub struct JobRunner {
    processor: Arc<dyn PrintFileProcessor>,
    slots: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(processor: Arc<dyn PrintFileProcessor>, max_concurrent_jobs: usize) -> Self {
        Self {
            processor,
            slots: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Queue `job` on `printer`. Must be called from within a Tokio runtime.
    pub fn submit(&self, job: Arc<PrintJob>, printer: Arc<dyn Printer>) -> JoinHandle<JobReport> {
        let processor = Arc::clone(&self.processor);
        let slots = Arc::clone(&self.slots);

        tokio::spawn(async move {
            let _slot = match slots.acquire_owned().await {
                Ok(slot) => slot,
                Err(e) => return JobReport::failed(&job, e),
            };
            debug!(job = %job.id(), "worker slot acquired");

            let worker_job = Arc::clone(&job);
            let worker = tokio::task::spawn_blocking(move || {
                processor.process_file(&worker_job, printer.as_ref())
            });

            match worker.await {
                Ok(report) => report,
                Err(e) => {
                    error!(job = %job.id(), error = %e, "job worker died");
                    JobReport::failed(&job, e)
                }
            }
        })
    }
}
