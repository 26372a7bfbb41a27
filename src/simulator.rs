//! Simulated Printer
//!
//! Stands in for real hardware on dry runs. Every motion command is
//! acknowledged and recorded; display traffic is logged.

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

use crate::display::SliceImage;
use crate::printer::{JobStatus, MotionResponse, Printer};

/// Simulator state, kept for inspection after a run.
#[derive(Debug, Default, Clone)]
pub struct SimulatorState {
    pub slices_shown: u64,
    pub blanks_shown: u64,
    pub commands_received: u64,
    /// Last 10 commands.
    pub command_history: Vec<String>,
}

impl SimulatorState {
    fn add_command(&mut self, cmd: &str) {
        self.commands_received += 1;
        self.command_history.push(cmd.to_string());
        if self.command_history.len() > 10 {
            self.command_history.remove(0);
        }
    }
}

#[derive(Debug)]
pub struct SimulatedPrinter {
    name: String,
    state: RwLock<SimulatorState>,
    status: Mutex<JobStatus>,
    resumed: Condvar,
}

impl SimulatedPrinter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(SimulatorState::default()),
            status: Mutex::new(JobStatus::Printing),
            resumed: Condvar::new(),
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.state.read().clone()
    }

    pub fn pause(&self) {
        let mut status = self.status.lock();
        if *status == JobStatus::Printing {
            *status = JobStatus::Paused;
        }
    }

    pub fn resume(&self) {
        let mut status = self.status.lock();
        if *status == JobStatus::Paused {
            *status = JobStatus::Printing;
        }
        self.resumed.notify_all();
    }

    pub fn cancel(&self) {
        *self.status.lock() = JobStatus::Cancelled;
        self.resumed.notify_all();
    }

    /// Mark the dry run finished. A cancelled run stays cancelled.
    pub fn finish(&self) {
        let mut status = self.status.lock();
        if status.is_in_progress() {
            *status = JobStatus::Completed;
        }
    }
}

impl Printer for SimulatedPrinter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_print_in_progress(&self) -> bool {
        self.status.lock().is_in_progress()
    }

    fn wait_for_pause_if_required(&self) {
        let mut status = self.status.lock();
        while *status == JobStatus::Paused {
            info!(printer = %self.name, "paused, waiting for resume");
            self.resumed.wait(&mut status);
        }
    }

    fn show_blank_image(&self) {
        self.state.write().blanks_shown += 1;
        debug!(printer = %self.name, "show blank");
    }

    fn show_image(&self, image: &Arc<SliceImage>) {
        self.state.write().slices_shown += 1;
        let (width, height) = image.dimensions();
        debug!(printer = %self.name, slice = image.index(), width, height, "show slice");
    }

    fn send_motion_command(&self, command: &str) -> MotionResponse {
        if !self.is_print_in_progress() {
            return MotionResponse::NoResponse;
        }
        self.state.write().add_command(command);
        debug!(printer = %self.name, command, "received motion command");
        MotionResponse::Ack("ok".to_string())
    }

    fn status(&self) -> JobStatus {
        *self.status.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acknowledges_and_records_commands() {
        let printer = SimulatedPrinter::new("sim");
        for i in 0..12 {
            assert_eq!(printer.send_motion_command(&format!("G1 Z{i}")), MotionResponse::Ack("ok".into()));
        }
        let state = printer.state();
        assert_eq!(state.commands_received, 12);
        assert_eq!(state.command_history.len(), 10);
        assert_eq!(state.command_history[0], "G1 Z2");
    }

    #[test]
    fn cancelled_printer_stops_answering() {
        let printer = SimulatedPrinter::new("sim");
        printer.cancel();
        assert!(!printer.is_print_in_progress());
        assert_eq!(printer.send_motion_command("G28"), MotionResponse::NoResponse);
        printer.finish();
        assert_eq!(printer.status(), JobStatus::Cancelled);
    }

    #[test]
    fn pause_blocks_until_resume() {
        let printer = Arc::new(SimulatedPrinter::new("sim"));
        printer.pause();

        let resumer = Arc::clone(&printer);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            resumer.resume();
        });

        printer.wait_for_pause_if_required();
        handle.join().unwrap();
        assert_eq!(printer.status(), JobStatus::Printing);
    }
}
