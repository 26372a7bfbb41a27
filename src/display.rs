//! Displayed Images
//!
//! One live slice image per job, readable by status queries while the job's
//! engine replaces it. Replacing hands the previous image back to the caller,
//! who releases it once the new one is on screen.

use image::DynamicImage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

use crate::error::JobError;
use crate::job::JobId;

#[derive(Debug)]
pub struct SliceImage {
    index: u32,
    path: PathBuf,
    raster: DynamicImage,
}

impl SliceImage {
    pub fn load(index: u32, path: &Path) -> Result<Self, JobError> {
        let raster = image::open(path).map_err(|source| JobError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_raster(index, path, raster))
    }

    pub fn from_raster(index: u32, path: impl Into<PathBuf>, raster: DynamicImage) -> Self {
        Self { index, path: path.into(), raster }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.raster.width(), self.raster.height())
    }
}

impl Drop for SliceImage {
    fn drop(&mut self) {
        trace!(slice = self.index, "slice image released");
    }
}

#[derive(Debug, Default)]
pub struct DisplayedImages {
    slots: RwLock<HashMap<JobId, Arc<SliceImage>>>,
}

impl DisplayedImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, job: JobId) -> Option<Arc<SliceImage>> {
        self.slots.read().get(&job).cloned()
    }

    /// Make `image` the job's current image, returning the one it replaced.
    #[must_use = "the previous image must be released after the new one is shown"]
    pub fn commit(&self, job: JobId, image: Arc<SliceImage>) -> Option<Arc<SliceImage>> {
        self.slots.write().insert(job, image)
    }

    /// Drop the job's slot entirely.
    pub fn release(&self, job: JobId) -> Option<Arc<SliceImage>> {
        self.slots.write().remove(&job)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears a job's slot when the run that owns it ends, on every exit path.
pub(crate) struct DisplayLease<'a> {
    images: &'a DisplayedImages,
    job: JobId,
}

impl<'a> DisplayLease<'a> {
    pub(crate) fn new(images: &'a DisplayedImages, job: JobId) -> Self {
        Self { images, job }
    }
}

impl Drop for DisplayLease<'_> {
    fn drop(&mut self) {
        if let Some(last) = self.images.release(self.job) {
            trace!(job = %self.job, slice = last.index(), "releasing final slice image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn image(index: u32) -> Arc<SliceImage> {
        Arc::new(SliceImage::from_raster(index, format!("s{index}.png"), DynamicImage::new_luma8(2, 2)))
    }

    #[test]
    fn commit_hands_back_previous() {
        let images = DisplayedImages::new();
        let job = Uuid::new_v4();

        assert!(images.commit(job, image(0)).is_none());
        let previous = images.commit(job, image(1)).unwrap();
        assert_eq!(previous.index(), 0);
        assert_eq!(images.current(job).unwrap().index(), 1);
    }

    #[test]
    fn jobs_have_independent_slots() {
        let images = DisplayedImages::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _ = images.commit(a, image(4));
        let _ = images.commit(b, image(9));

        assert_eq!(images.current(a).unwrap().index(), 4);
        assert_eq!(images.current(b).unwrap().index(), 9);
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn lease_clears_slot_on_drop() {
        let images = DisplayedImages::new();
        let job = Uuid::new_v4();
        let weak = {
            let _lease = DisplayLease::new(&images, job);
            let shown = image(3);
            let weak = Arc::downgrade(&shown);
            let _ = images.commit(job, shown);
            weak
        };
        assert!(images.is_empty());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn missing_file_is_image_load_error() {
        let err = SliceImage::load(0, Path::new("/nonexistent/slice0.png")).unwrap_err();
        assert!(matches!(err, JobError::ImageLoad { .. }));
    }
}
