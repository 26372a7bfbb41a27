//! Motion Command Dispatch
//!
//! A command is retried while the controller stays silent, up to a fixed
//! number of attempts. Running out of attempts is a terminal state of its
//! own and does not fail the job.
//!
//! TODO: exhausting retries drops the command without telling the job owner;
//! surface it on `JobReport` once the status layer can show warnings.

use tracing::{debug, warn};

use crate::printer::{MotionResponse, Printer};

pub const DEFAULT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    /// About to make attempt `n` (1-based).
    Attempting(u32),
    Succeeded { response: String, attempts: u32 },
    ExhaustedRetries { attempts: u32 },
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DispatchState::Attempting(_))
    }

    fn step(self, printer: &dyn Printer, command: &str, max_attempts: u32) -> DispatchState {
        let DispatchState::Attempting(n) = self else { return self };

        match printer.send_motion_command(command) {
            MotionResponse::Ack(response) => DispatchState::Succeeded { response, attempts: n },
            MotionResponse::NoResponse if n >= max_attempts => {
                warn!(command, attempts = n, "controller never answered, moving on");
                DispatchState::ExhaustedRetries { attempts: n }
            }
            MotionResponse::NoResponse => {
                warn!(command, attempt = n, "controller timed out");
                DispatchState::Attempting(n + 1)
            }
        }
    }
}

/// Send `command`, retrying on silence. Always returns a terminal state.
pub fn dispatch(printer: &dyn Printer, command: &str, max_attempts: u32) -> DispatchState {
    let max_attempts = max_attempts.max(1);
    let mut state = DispatchState::Attempting(1);
    while !state.is_terminal() {
        state = state.step(printer, command, max_attempts);
    }
    if let DispatchState::Succeeded { response, .. } = &state {
        debug!(command, response = response.as_str(), "printer response");
    }
    state
}
