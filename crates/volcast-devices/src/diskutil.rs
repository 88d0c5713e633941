//! macOS discovery through `/Volumes` and `diskutil info -plist`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::discovery::{DiscoveredVolume, VolumeDiscovery, run_tool};
use crate::error::{DiscoveryError, DiscoveryResult};

/// Subset of `diskutil info -plist` used for discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskutilInfo {
    /// Device node identifier (`disk4s1`).
    #[serde(default)]
    pub device_identifier: Option<String>,
    /// Current volume name.
    #[serde(default)]
    pub volume_name: Option<String>,
    /// Mount point reported by diskutil.
    #[serde(default)]
    pub mount_point: Option<String>,
    /// Filesystem personality (`msdos`, `exfat`, `apfs`).
    #[serde(default)]
    pub filesystem_type: Option<String>,
    /// Capacity in bytes.
    #[serde(default)]
    pub total_size: Option<u64>,
    /// Whether the backing disk is internal.
    #[serde(default)]
    pub internal: Option<bool>,
    /// Whether the media is removable.
    #[serde(default)]
    pub removable_media: Option<bool>,
}

/// Parse one `diskutil info -plist` document.
///
/// # Errors
///
/// Returns [`DiscoveryError::Plist`] when the document is not a property list.
pub fn parse_diskutil_info(stdout: &[u8]) -> DiscoveryResult<DiskutilInfo> {
    plist::from_bytes(stdout).map_err(|source| DiscoveryError::Plist { source })
}

/// Turn diskutil details for `path` into a discovered volume, dropping
/// internal disks. Internal card readers report removable media and are kept.
#[must_use]
pub fn volume_from_info(path: &Path, info: DiskutilInfo) -> Option<DiscoveredVolume> {
    if info.internal.unwrap_or(false) && !info.removable_media.unwrap_or(false) {
        return None;
    }
    Some(DiscoveredVolume {
        mount_point: info.mount_point.map_or_else(|| path.to_path_buf(), PathBuf::from),
        device: info.device_identifier,
        label: info.volume_name,
        filesystem: info.filesystem_type,
        size_bytes: info.total_size,
    })
}

/// Enumerates external volumes mounted under `/Volumes`.
#[derive(Debug, Clone)]
pub struct DiskutilDiscovery {
    volumes_dir: PathBuf,
}

impl Default for DiskutilDiscovery {
    fn default() -> Self {
        Self {
            volumes_dir: PathBuf::from("/Volumes"),
        }
    }
}

impl DiskutilDiscovery {
    /// Scan `volumes_dir` instead of `/Volumes`.
    #[must_use]
    pub fn with_volumes_dir(volumes_dir: impl Into<PathBuf>) -> Self {
        Self {
            volumes_dir: volumes_dir.into(),
        }
    }

    /// Directories under the volumes directory, skipping symbolic links such as
    /// the boot volume alias, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::ReadDir`] when the directory cannot be listed.
    pub fn candidate_mounts(&self) -> DiscoveryResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.volumes_dir).map_err(|source| DiscoveryError::ReadDir {
            path: self.volumes_dir.clone(),
            source,
        })?;
        let mut mounts: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_dir())
            })
            .collect();
        mounts.sort();
        Ok(mounts)
    }
}

impl VolumeDiscovery for DiskutilDiscovery {
    fn discover(&self) -> DiscoveryResult<Vec<DiscoveredVolume>> {
        let mut volumes = Vec::new();
        for mount in self.candidate_mounts()? {
            let Some(mount_str) = mount.to_str() else {
                debug!(path = %mount.display(), "skipping non UTF-8 mount path");
                continue;
            };
            let info = match run_tool("diskutil", &["info", "-plist", mount_str])
                .and_then(|stdout| parse_diskutil_info(&stdout))
            {
                Ok(info) => info,
                Err(err) => {
                    debug!(path = %mount.display(), error = %err, "skipping volume without diskutil info");
                    continue;
                }
            };
            if let Some(volume) = volume_from_info(&mount, info) {
                volumes.push(volume);
            }
        }
        Ok(volumes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const EXTERNAL: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>DeviceIdentifier</key>
    <string>disk4s1</string>
    <key>VolumeName</key>
    <string>UNTITLED</string>
    <key>MountPoint</key>
    <string>/Volumes/UNTITLED</string>
    <key>FilesystemType</key>
    <string>msdos</string>
    <key>TotalSize</key>
    <integer>31037849600</integer>
    <key>Internal</key>
    <false/>
    <key>RemovableMedia</key>
    <true/>
</dict>
</plist>"#;

    const INTERNAL: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>DeviceIdentifier</key>
    <string>disk1s5</string>
    <key>MountPoint</key>
    <string>/</string>
    <key>Internal</key>
    <true/>
</dict>
</plist>"#;

    #[test]
    fn external_volume_is_discovered() -> Result<()> {
        let info = parse_diskutil_info(EXTERNAL)?;
        assert_eq!(info.removable_media, Some(true));
        let volume = volume_from_info(Path::new("/Volumes/UNTITLED"), info)
            .ok_or_else(|| anyhow::anyhow!("external volume skipped"))?;
        assert_eq!(volume.mount_point, PathBuf::from("/Volumes/UNTITLED"));
        assert_eq!(volume.device.as_deref(), Some("disk4s1"));
        assert_eq!(volume.filesystem.as_deref(), Some("msdos"));
        assert_eq!(volume.size_bytes, Some(31_037_849_600));
        Ok(())
    }

    #[test]
    fn internal_volume_is_skipped() -> Result<()> {
        let info = parse_diskutil_info(INTERNAL)?;
        assert!(volume_from_info(Path::new("/Volumes/Macintosh HD"), info).is_none());
        Ok(())
    }

    #[test]
    fn internal_card_reader_is_kept() -> Result<()> {
        let info = DiskutilInfo {
            device_identifier: Some("disk5s1".into()),
            mount_point: Some("/Volumes/SDCARD".into()),
            internal: Some(true),
            removable_media: Some(true),
            ..DiskutilInfo::default()
        };
        let volume = volume_from_info(Path::new("/Volumes/SDCARD"), info)
            .ok_or_else(|| anyhow::anyhow!("card reader skipped"))?;
        assert_eq!(volume.device.as_deref(), Some("disk5s1"));
        Ok(())
    }

    #[test]
    fn garbage_is_a_plist_error() {
        assert!(matches!(
            parse_diskutil_info(b"not a plist"),
            Err(DiscoveryError::Plist { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn candidate_mounts_skip_symlinks_and_files() -> Result<()> {
        let volumes = tempfile::tempdir()?;
        std::fs::create_dir(volumes.path().join("STICK"))?;
        std::fs::create_dir(volumes.path().join("CARD"))?;
        std::fs::write(volumes.path().join(".DS_Store"), b"")?;
        std::os::unix::fs::symlink("/", volumes.path().join("Macintosh HD"))?;

        let discovery = DiskutilDiscovery::with_volumes_dir(volumes.path());
        let mounts = discovery.candidate_mounts()?;
        assert_eq!(
            mounts,
            vec![volumes.path().join("CARD"), volumes.path().join("STICK")]
        );
        Ok(())
    }
}
