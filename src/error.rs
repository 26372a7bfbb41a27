//! Job Errors
//!
//! Preparation errors (staging, pad width) abort before the printer is
//! touched. Engine errors abort the run and release the displayed image.
//! `InterruptedDelay` is the only non-fatal variant.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Couldn't unpack job {archive} into working directory {dir}: {source}")]
    Extraction {
        archive: PathBuf,
        dir: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Couldn't clean up extract directory {dir}: {source}")]
    Cleanup {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Expected exactly one command file in {dir}, found {found}")]
    AmbiguousOrMissingCommandFile { dir: PathBuf, found: usize },

    #[error("No slice image for index zero found next to {command_file}")]
    PadWidthNotResolved { command_file: PathBuf },

    #[error("Slice marker on line {line} before any 'Number of Slices' declaration")]
    MissingSliceCountDeclaration { line: usize },

    #[error("Couldn't load slice image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Couldn't read command stream {path}: {source}")]
    CommandStreamRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Exposure delay interrupted after {elapsed_ms}ms")]
    InterruptedDelay { elapsed_ms: u64 },
}

impl JobError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, JobError::InterruptedDelay { .. })
    }

    pub(crate) fn extraction(
        archive: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        JobError::Extraction {
            archive: archive.into(),
            dir: dir.into(),
            source: source.into(),
        }
    }
}
