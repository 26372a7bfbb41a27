//! Execution Engine
//!
//! Walks a command file line by line and keeps the display surface in step
//! with the motion controller. A slice image is committed and shown before
//! the job-changed notification goes out, and the image it replaced is only
//! released after both.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::directive::{Directive, Directives, SliceMarker};
use crate::display::{DisplayLease, DisplayedImages, SliceImage};
use crate::error::JobError;
use crate::job::{JobId, PrintJob};
use crate::motion::{self, DispatchState};
use crate::notify::NotificationSink;
use crate::padding::{resolve_pad_width, slice_image_path};
use crate::printer::{JobStatus, Printer};

pub struct SceneEngine {
    images: DisplayedImages,
    notifier: Arc<dyn NotificationSink>,
    motion_attempts: u32,
    image_extension: String,
}

/// Per-run bookkeeping that isn't part of the job's public state.
struct Scene<'a> {
    command_file: &'a Path,
    pad_width: usize,
    slice_count: Option<u32>,
    last_display: Option<Instant>,
}

impl SceneEngine {
    pub fn new(
        notifier: Arc<dyn NotificationSink>,
        motion_attempts: u32,
        image_extension: impl Into<String>,
    ) -> Self {
        Self {
            images: DisplayedImages::new(),
            notifier,
            motion_attempts,
            image_extension: image_extension.into(),
        }
    }

    pub fn current_image(&self, job: JobId) -> Option<Arc<SliceImage>> {
        self.images.current(job)
    }

    pub fn displayed_images(&self) -> &DisplayedImages {
        &self.images
    }

    /// Execute `command_file` for `job` until end of file or until the
    /// printer stops printing. Returns the printer's status at that point.
    pub fn run(
        &self,
        job: &PrintJob,
        printer: &dyn Printer,
        command_file: &Path,
    ) -> Result<JobStatus, JobError> {
        let pad_width = resolve_pad_width(command_file, &self.image_extension)?;
        let file = File::open(command_file).map_err(|source| JobError::CommandStreamRead {
            path: command_file.to_path_buf(),
            source,
        })?;

        let _lease = DisplayLease::new(&self.images, job.id());
        let mut scene = Scene {
            command_file,
            pad_width,
            slice_count: None,
            last_display: None,
        };

        info!(file = %command_file.display(), pad_width, "parsing command file");
        let mut directives = Directives::new(BufReader::new(file));

        while printer.is_print_in_progress() {
            let Some(next) = directives.next() else { break };
            let (line, directive) = next.map_err(|source| JobError::CommandStreamRead {
                path: command_file.to_path_buf(),
                source,
            })?;
            self.apply(&mut scene, job, printer, line, directive)?;
        }

        Ok(printer.status())
    }

    fn apply(
        &self,
        scene: &mut Scene<'_>,
        job: &PrintJob,
        printer: &dyn Printer,
        line: usize,
        directive: Directive,
    ) -> Result<(), JobError> {
        match directive {
            Directive::Slice(marker) => {
                if scene.slice_count.is_none() {
                    return Err(JobError::MissingSliceCountDeclaration { line });
                }
                match marker {
                    SliceMarker::Blank => {
                        debug!("show blank");
                        printer.show_blank_image();
                        // Nothing is being cured, so the printer may pause here.
                        printer.wait_for_pause_if_required();
                    }
                    SliceMarker::Index(index) => self.show_slice(scene, job, printer, index)?,
                }
            }

            Directive::Delay(ms) => {
                let exposure = job.exposure_for(ms);
                debug!(ms = exposure.as_millis() as u64, "exposure delay");
                if let Err(e) = job.expose(exposure) {
                    warn!(error = %e, "continuing after interrupted delay");
                }
            }

            Directive::SliceCount(count) => {
                scene.slice_count = Some(count);
                job.update(|p| p.total_slices = Some(count));
                info!(slices = count, "slice count declared");
            }

            Directive::LiftSpeed(speed) => {
                job.update(|p| p.z_lift_speed = Some(speed));
                debug!("lift speed {:.3}", speed);
            }

            Directive::LiftDistance(distance) => {
                job.update(|p| p.z_lift_distance = Some(distance));
                debug!("lift distance {:.3}", distance);
            }

            Directive::Motion(command) => {
                debug!(line, command = command.as_str(), "send motion command");
                if let DispatchState::ExhaustedRetries { .. } =
                    motion::dispatch(printer, &command, self.motion_attempts)
                {
                    trace!(line, "motion command dropped");
                }
            }

            Directive::Comment => trace!(line, "ignored line"),
        }
        Ok(())
    }

    fn show_slice(
        &self,
        scene: &mut Scene<'_>,
        job: &PrintJob,
        printer: &dyn Printer,
        index: u32,
    ) -> Result<(), JobError> {
        let now = Instant::now();
        if let Some(last) = scene.last_display {
            let elapsed = now.duration_since(last).as_millis() as u64;
            job.update(|p| p.current_slice_time_ms = Some(elapsed));
        }
        scene.last_display = Some(now);
        job.update(|p| p.current_slice = Some(index));

        let path = slice_image_path(scene.command_file, index, scene.pad_width, &self.image_extension);
        let image = Arc::new(SliceImage::load(index, &path)?);

        let previous = self.images.commit(job.id(), Arc::clone(&image));
        printer.show_image(&image);
        info!(slice = index, image = %path.display(), "show slice");

        self.notifier.job_changed(printer, job);

        if let Some(previous) = previous {
            trace!(slice = previous.index(), "releasing previous slice");
            drop(previous);
        }
        Ok(())
    }
}
