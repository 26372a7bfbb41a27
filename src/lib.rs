//! ResinScene Core - Scene File Job Interpreter
//!
//! Drives a resin printer from a job's command file, keeping the projected
//! slice image in lock-step with the motion controller.
//!
//! Flow: stage the archive, resolve the image pad width, then execute the
//! command file directive by directive.

pub mod config;
pub mod error;
pub mod staging;
pub mod padding;
pub mod directive;
pub mod job;
pub mod display;
pub mod printer;
pub mod motion;
pub mod notify;
pub mod engine;
pub mod processor;
pub mod runner;
pub mod simulator;

pub use config::{ConfigError, HostConfig};
pub use error::JobError;
pub use staging::ArchiveStager;
pub use padding::{resolve_pad_width, slice_image_path};
pub use directive::{Directive, Directives, SliceMarker};
pub use job::{JobId, JobProgress, JobSnapshot, PrintJob};
pub use display::{DisplayedImages, SliceImage};
pub use printer::{JobStatus, MotionResponse, Printer};
pub use motion::DispatchState;
pub use notify::{BroadcastNotifier, NotificationSink, TracingNotifier};
pub use engine::SceneEngine;
pub use processor::{JobReport, PrintFileProcessor, SceneFileProcessor};
pub use runner::JobRunner;
pub use simulator::SimulatedPrinter;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
