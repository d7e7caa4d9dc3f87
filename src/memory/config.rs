//! Configuration types for file-backed topology regions

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PERMISSIONS, HEADER_SIZE, PARTIAL_SUFFIX};

/// Configuration for creating a writable topology region
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Final path of the backing file
    pub path: PathBuf,
    /// Total file length in bytes, header included
    pub size: usize,
    /// Permissions for the backing file (Unix permissions)
    pub permissions: u32,
    /// Build under a staging name and rename onto `path` once published
    pub publish_on_rename: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            size: 0,
            permissions: DEFAULT_PERMISSIONS,
            publish_on_rename: true,
        }
    }
}

impl RegionConfig {
    /// Create a new region configuration
    pub fn new(path: impl Into<PathBuf>, size: usize) -> Self {
        Self {
            path: path.into(),
            size,
            ..Default::default()
        }
    }

    /// Set the permissions for the backing file
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set whether the file is published by rename after writing
    pub fn with_publish_on_rename(mut self, publish_on_rename: bool) -> Self {
        self.publish_on_rename = publish_on_rename;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::TopomapError;

        if self.path.as_os_str().is_empty() {
            return Err(TopomapError::invalid_parameter(
                "path",
                "Region path cannot be empty",
            ));
        }

        if self.size <= HEADER_SIZE {
            return Err(TopomapError::invalid_parameter(
                "size",
                format!("Region size must exceed the {} byte header", HEADER_SIZE),
            ));
        }

        if self.publish_on_rename && self.path.file_name().is_none() {
            return Err(TopomapError::invalid_parameter(
                "path",
                "Publishing by rename needs a path that names a file",
            ));
        }

        Ok(())
    }

    /// Path the writer maps while the region is being built
    pub fn staging_path(&self) -> PathBuf {
        if self.publish_on_rename {
            staging_path_for(&self.path)
        } else {
            self.path.clone()
        }
    }
}

/// Sibling staging path used before a region is published
pub fn staging_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Access mode of a mapped region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Created for writing, mapped read-write shared
    Write,
    /// Opened for reading, mapped read-only
    Read,
}

impl AccessMode {
    /// Get a human-readable name for the access mode
    pub fn name(&self) -> &'static str {
        match self {
            AccessMode::Write => "write",
            AccessMode::Read => "read",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_config_default() {
        let config = RegionConfig::default();
        assert_eq!(config.permissions, 0o600);
        assert!(config.publish_on_rename);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_region_config_validation() {
        let mut config = RegionConfig::new("/tmp/topo", HEADER_SIZE);
        assert!(config.validate().is_err());

        config.size = 4096;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_staging_path() {
        let config = RegionConfig::new("/tmp/mpi/1", 4096);
        assert_eq!(config.staging_path(), PathBuf::from("/tmp/mpi/1.partial"));

        let config = config.with_publish_on_rename(false);
        assert_eq!(config.staging_path(), PathBuf::from("/tmp/mpi/1"));
    }
}
