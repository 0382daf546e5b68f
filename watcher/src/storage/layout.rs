//! Where the watcher keeps its files

use std::path::{Path, PathBuf};

use crate::filesys::file::File;

/// Overrides the platform base directory
pub const HOME_ENV: &str = "RANGEWATCH_HOME";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/settings.json`
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// `<base>/logs`, target of the rolling file appender
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    fn platform_base_dir() -> PathBuf {
        if cfg!(target_os = "linux") {
            return PathBuf::from("/etc/rangewatch");
        }
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rangewatch")
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        match std::env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new(Self::platform_base_dir()),
        }
    }
}
