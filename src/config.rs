//! Host Configuration
//!
//! Loaded from a JSON file. Every field has a default, so a partial file
//! (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Appended to an archive's file name to form its working directory name.
pub const EXTRACTION_MARKER: &str = "extract";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_motion_attempts")]
    pub motion_attempts: u32,
    #[serde(default = "default_command_file_extensions")]
    pub command_file_extensions: Vec<String>,
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
}

fn default_working_dir() -> PathBuf { std::env::temp_dir().join("resinscene") }
fn default_max_concurrent_jobs() -> usize { 4 }
fn default_motion_attempts() -> u32 { 3 }
fn default_command_file_extensions() -> Vec<String> { vec!["gcode".to_string()] }
fn default_archive_extensions() -> Vec<String> { vec!["zip".to_string(), "cws".to_string()] }
fn default_image_extension() -> String { "png".to_string() }

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            motion_attempts: default_motion_attempts(),
            command_file_extensions: default_command_file_extensions(),
            archive_extensions: default_archive_extensions(),
            image_extension: default_image_extension(),
        }
    }
}

impl HostConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// `{working_dir}/{archive file name}extract`
    pub fn extraction_dir(&self, archive: &Path) -> PathBuf {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.working_dir.join(format!("{}{}", name, EXTRACTION_MARKER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        fs::write(&path, r#"{"motionAttempts": 5, "workingDir": "/srv/jobs"}"#).unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.motion_attempts, 5);
        assert_eq!(config.working_dir, PathBuf::from("/srv/jobs"));
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.command_file_extensions, vec!["gcode"]);
        assert_eq!(config.image_extension, "png");
    }

    #[test]
    fn missing_file_is_default() {
        let config = HostConfig::load(Path::new("/nonexistent/host.json")).unwrap();
        assert_eq!(config.motion_attempts, 3);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(HostConfig::load(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn extraction_dir_appends_marker() {
        let config = HostConfig::default().with_working_dir("/work");
        assert_eq!(
            config.extraction_dir(Path::new("/uploads/part.cws")),
            PathBuf::from("/work/part.cwsextract")
        );
    }
}
