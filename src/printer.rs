//! Printer Interface
//!
//! What the engine needs from the display surface and motion controller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::display::SliceImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ready,
    Printing,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_in_progress(self) -> bool {
        matches!(self, JobStatus::Printing | JobStatus::Paused)
    }
}

/// Reply to a motion command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionResponse {
    /// Controller echo or acknowledgement.
    Ack(String),
    /// Controller didn't answer, or the printer stopped.
    NoResponse,
}

pub trait Printer: Send + Sync {
    fn name(&self) -> &str;

    fn is_print_in_progress(&self) -> bool;

    /// Block until any pending pause request has been cleared.
    fn wait_for_pause_if_required(&self);

    fn show_blank_image(&self);

    fn show_image(&self, image: &Arc<SliceImage>);

    fn send_motion_command(&self, command: &str) -> MotionResponse;

    fn status(&self) -> JobStatus;
}
