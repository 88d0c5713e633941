//! Discovery trait, shared model and platform selection.

use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;
use tracing::debug;

use crate::diskutil::DiskutilDiscovery;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::logical_disk::LogicalDiskDiscovery;
use crate::lsblk::LsblkDiscovery;

/// A mounted removable volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredVolume {
    /// Mount root, used as the volume identifier.
    pub mount_point: PathBuf,
    /// Backing device when known (`/dev/sdb1`, `disk4s1`, `E:`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Current label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Filesystem type as reported by the platform tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<String>,
    /// Capacity in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl DiscoveredVolume {
    /// Volume known only by its mount root.
    #[must_use]
    pub fn at(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
            device: None,
            label: None,
            filesystem: None,
            size_bytes: None,
        }
    }
}

/// Source of candidate target volumes.
pub trait VolumeDiscovery: Send + Sync {
    /// Enumerate mounted removable volumes in a stable order.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the platform tool cannot be run or its
    /// output cannot be parsed.
    fn discover(&self) -> DiscoveryResult<Vec<DiscoveredVolume>>;
}

/// Discovery over an explicit list of mount roots.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    roots: Vec<PathBuf>,
}

impl StaticDiscovery {
    /// Discovery returning `roots` in the given order.
    #[must_use]
    pub const fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl VolumeDiscovery for StaticDiscovery {
    fn discover(&self) -> DiscoveryResult<Vec<DiscoveredVolume>> {
        Ok(self.roots.iter().map(DiscoveredVolume::at).collect())
    }
}

/// Select the discovery strategy for the running platform.
///
/// # Errors
///
/// Returns [`DiscoveryError::Unsupported`] on platforms without a strategy.
pub fn platform_discovery() -> DiscoveryResult<Box<dyn VolumeDiscovery>> {
    match std::env::consts::OS {
        "linux" => Ok(Box::new(LsblkDiscovery)),
        "macos" => Ok(Box::new(DiskutilDiscovery::default())),
        "windows" => Ok(Box::new(LogicalDiskDiscovery)),
        platform => Err(DiscoveryError::Unsupported { platform }),
    }
}

/// Run `program` and return its standard output.
pub(crate) fn run_tool(program: &str, args: &[&str]) -> DiscoveryResult<Vec<u8>> {
    debug!(program, ?args, "running discovery tool");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| DiscoveryError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(DiscoveryError::ToolFailed {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn static_discovery_preserves_order() -> Result<()> {
        let discovery = StaticDiscovery::new(vec!["/media/b".into(), "/media/a".into()]);
        let volumes = discovery.discover()?;
        let roots: Vec<_> = volumes.iter().map(|volume| volume.mount_point.clone()).collect();
        assert_eq!(roots, vec![PathBuf::from("/media/b"), PathBuf::from("/media/a")]);
        assert!(volumes[0].device.is_none());
        Ok(())
    }

    #[test]
    fn missing_tool_is_a_spawn_error() {
        assert!(matches!(
            run_tool("volcast-definitely-missing-tool", &[]),
            Err(DiscoveryError::Spawn { .. })
        ));
    }

    #[cfg(any(target_os = "linux", target_os = "macos", windows))]
    #[test]
    fn supported_platforms_select_a_strategy() {
        assert!(platform_discovery().is_ok());
    }
}
