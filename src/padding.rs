//! Slice Image Naming
//!
//! Slicers name images `{basename}{zero-padded index}.{ext}` next to the
//! command file. The pad width isn't recorded anywhere, so it is probed.

use std::path::{Path, PathBuf};

use crate::error::JobError;

pub const MAX_PAD_WIDTH: usize = 9;

/// Path of the image for slice `index` at the given pad width.
pub fn slice_image_path(command_file: &Path, index: u32, width: usize, extension: &str) -> PathBuf {
    let stem = command_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}{:0width$}.{}", stem, index, extension, width = width);
    match command_file.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// First width in `1..=9` for which the slice-zero image exists.
pub fn resolve_pad_width(command_file: &Path, extension: &str) -> Result<usize, JobError> {
    (1..=MAX_PAD_WIDTH)
        .find(|&width| slice_image_path(command_file, 0, width, extension).is_file())
        .ok_or_else(|| JobError::PadWidthNotResolved {
            command_file: command_file.to_path_buf(),
        })
}
