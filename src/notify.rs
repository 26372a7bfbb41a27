//! Job Change Notifications
//!
//! Fire-and-forget. A sink that can't deliver drops the event.

use tokio::sync::broadcast;
use tracing::info;

use crate::job::{JobSnapshot, PrintJob};
use crate::printer::Printer;

pub trait NotificationSink: Send + Sync {
    fn job_changed(&self, printer: &dyn Printer, job: &PrintJob);
}

/// Logs each change.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn job_changed(&self, printer: &dyn Printer, job: &PrintJob) {
        let progress = job.progress();
        info!(
            printer = printer.name(),
            job = %job.id(),
            slice = progress.current_slice,
            total = progress.total_slices,
            "job changed"
        );
    }
}

/// Publishes a snapshot of the job to every subscriber.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<JobSnapshot>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastNotifier {
    fn job_changed(&self, _printer: &dyn Printer, job: &PrintJob) {
        // Err only means nobody is listening.
        let _ = self.sender.send(job.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedPrinter;

    #[test]
    fn broadcast_delivers_snapshots() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        let printer = SimulatedPrinter::new("sim");
        let job = PrintJob::new("part.cws");
        job.update(|p| p.current_slice = Some(5));

        notifier.job_changed(&printer, &job);

        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.id, job.id());
        assert_eq!(snapshot.progress.current_slice, Some(5));
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new(1);
        let printer = SimulatedPrinter::new("sim");
        notifier.job_changed(&printer, &PrintJob::new("part.cws"));
    }
}
