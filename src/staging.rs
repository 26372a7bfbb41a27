//! Archive Staging
//!
//! Unpacks a job container into its own working directory and finds the
//! single command file inside it.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::error::JobError;

pub struct ArchiveStager {
    config: HostConfig,
}

impl ArchiveStager {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    pub fn working_dir(&self, archive: &Path) -> PathBuf {
        self.config.extraction_dir(archive)
    }

    /// True when the archive's extension is one of the accepted containers.
    pub fn accepts(&self, archive: &Path) -> bool {
        has_extension(archive, &self.config.archive_extensions)
    }

    /// Unpack `archive` into a fresh working directory.
    ///
    /// Any previous working directory for the same archive is removed first.
    /// On error the directory may be partially populated and must not be used.
    pub fn prepare(&self, archive: &Path) -> Result<PathBuf, JobError> {
        let dir = self.working_dir(archive);

        if dir.exists() {
            debug!(dir = %dir.display(), "removing stale working directory");
            fs::remove_dir_all(&dir).map_err(|e| JobError::extraction(archive, &dir, e))?;
        }
        fs::create_dir_all(&dir).map_err(|e| JobError::extraction(archive, &dir, e))?;

        let file = File::open(archive).map_err(|e| JobError::extraction(archive, &dir, e))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| JobError::extraction(archive, &dir, e))?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| JobError::extraction(archive, &dir, e))?;

            let relative = entry.enclosed_name().ok_or_else(|| {
                JobError::extraction(
                    archive,
                    &dir,
                    format!("entry '{}' escapes the working directory", entry.name()),
                )
            })?;
            let destination = dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&destination).map_err(|e| JobError::extraction(archive, &dir, e))?;
                continue;
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| JobError::extraction(archive, &dir, e))?;
            }
            let mut out = File::create(&destination).map_err(|e| JobError::extraction(archive, &dir, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| JobError::extraction(archive, &dir, e))?;
        }

        info!(archive = %archive.display(), dir = %dir.display(), entries = zip.len(), "job unpacked");
        Ok(dir)
    }

    /// Delete the working directory. A directory that doesn't exist is fine.
    pub fn cleanup(&self, archive: &Path) -> Result<(), JobError> {
        let dir = self.working_dir(archive);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|source| JobError::Cleanup { dir: dir.clone(), source })?;
            debug!(dir = %dir.display(), "working directory removed");
        }
        Ok(())
    }

    /// Recursively search `dir` for exactly one command file.
    pub fn locate_command_file(&self, dir: &Path) -> Result<PathBuf, JobError> {
        let mut found = vec![];
        collect_with_extension(dir, &self.config.command_file_extensions, &mut found);

        if found.len() == 1 {
            Ok(found.remove(0))
        } else {
            Err(JobError::AmbiguousOrMissingCommandFile {
                dir: dir.to_path_buf(),
                found: found.len(),
            })
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

// Unreadable subdirectories are skipped, they can't hold a usable command file.
fn collect_with_extension(dir: &Path, extensions: &[String], found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_with_extension(&path, extensions, found);
        } else if has_extension(&path, extensions) {
            found.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    fn stager(root: &Path) -> ArchiveStager {
        ArchiveStager::new(HostConfig::default().with_working_dir(root.join("work")))
    }

    #[test]
    fn prepare_recreates_nested_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("part.cws");
        write_zip(&archive, &[
            ("slices/", b""),
            ("slices/part.gcode", b"G28\n"),
            ("deep/er/note.txt", b"hello"),
        ]);

        let stager = stager(tmp.path());
        let dir = stager.prepare(&archive).unwrap();

        assert_eq!(dir, tmp.path().join("work").join("part.cwsextract"));
        assert_eq!(fs::read_to_string(dir.join("slices/part.gcode")).unwrap(), "G28\n");
        assert_eq!(fs::read_to_string(dir.join("deep/er/note.txt")).unwrap(), "hello");
        assert_eq!(stager.locate_command_file(&dir).unwrap(), dir.join("slices/part.gcode"));
    }

    #[test]
    fn prepare_discards_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("part.zip");
        write_zip(&archive, &[("part.gcode", b"G28\n")]);

        let stager = stager(tmp.path());
        let dir = stager.prepare(&archive).unwrap();
        fs::write(dir.join("leftover.gcode"), "old").unwrap();

        let again = stager.prepare(&archive).unwrap();
        assert_eq!(dir, again);
        assert!(!again.join("leftover.gcode").exists());
        assert!(stager.locate_command_file(&again).is_ok());
    }

    #[test]
    fn prepare_rejects_non_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("part.zip");
        fs::write(&archive, "definitely not a zip").unwrap();

        let err = stager(tmp.path()).prepare(&archive).unwrap_err();
        assert!(matches!(err, JobError::Extraction { .. }));
    }

    #[test]
    fn locate_requires_exactly_one() {
        let tmp = tempfile::tempdir().unwrap();
        let stager = stager(tmp.path());
        let dir = tmp.path().join("staged");
        fs::create_dir_all(dir.join("sub")).unwrap();

        let err = stager.locate_command_file(&dir).unwrap_err();
        assert!(matches!(err, JobError::AmbiguousOrMissingCommandFile { found: 0, .. }));

        fs::write(dir.join("a.gcode"), "").unwrap();
        fs::write(dir.join("sub").join("b.GCODE"), "").unwrap();
        let err = stager.locate_command_file(&dir).unwrap_err();
        assert!(matches!(err, JobError::AmbiguousOrMissingCommandFile { found: 2, .. }));
        assert!(dir.join("a.gcode").exists());
    }

    #[test]
    fn cleanup_tolerates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("part.zip");
        write_zip(&archive, &[("part.gcode", b"")]);

        let stager = stager(tmp.path());
        stager.cleanup(&archive).unwrap();
        let dir = stager.prepare(&archive).unwrap();
        stager.cleanup(&archive).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn accepts_container_extensions() {
        let stager = ArchiveStager::new(HostConfig::default());
        assert!(stager.accepts(Path::new("a.ZIP")));
        assert!(stager.accepts(Path::new("a.cws")));
        assert!(!stager.accepts(Path::new("a.stl")));
    }
}
