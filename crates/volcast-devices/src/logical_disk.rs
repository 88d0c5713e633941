//! Windows discovery through `Win32_LogicalDisk`, queried in PowerShell and
//! returned as JSON.

use std::path::PathBuf;

use serde::Deserialize;

use crate::discovery::{DiscoveredVolume, VolumeDiscovery, run_tool};
use crate::error::{DiscoveryError, DiscoveryResult};

/// `DriveType=2` is `DRIVE_REMOVABLE`. `@(...)` keeps a single drive an array.
const LOGICAL_DISK_QUERY: &str = "ConvertTo-Json -Compress -InputObject @(\
    Get-CimInstance -ClassName Win32_LogicalDisk -Filter 'DriveType=2' | \
    Select-Object DeviceID,VolumeName,FileSystem,Size)";

/// Enumerates removable drive roots (`E:\`) on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogicalDiskDiscovery;

impl VolumeDiscovery for LogicalDiskDiscovery {
    fn discover(&self) -> DiscoveryResult<Vec<DiscoveredVolume>> {
        let stdout = run_tool(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", LOGICAL_DISK_QUERY],
        )?;
        parse_logical_disks(&stdout)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LogicalDisk {
    #[serde(rename = "DeviceID")]
    device_id: String,
    #[serde(default)]
    volume_name: Option<String>,
    #[serde(default)]
    file_system: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Older PowerShell releases unwrap one-element arrays.
#[derive(Deserialize)]
#[serde(untagged)]
enum LogicalDisks {
    Many(Vec<LogicalDisk>),
    One(LogicalDisk),
}

/// Parse the JSON emitted by the logical disk query, in drive letter order.
///
/// Drives without media report no filesystem and no size and are skipped.
///
/// # Errors
///
/// Returns [`DiscoveryError::Json`] for malformed output.
pub fn parse_logical_disks(stdout: &[u8]) -> DiscoveryResult<Vec<DiscoveredVolume>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let disks = match serde_json::from_slice::<LogicalDisks>(stdout)
        .map_err(|source| DiscoveryError::Json { source })?
    {
        LogicalDisks::Many(disks) => disks,
        LogicalDisks::One(disk) => vec![disk],
    };
    let mut volumes: Vec<DiscoveredVolume> = disks
        .into_iter()
        .filter(|disk| disk.file_system.is_some() || disk.size.is_some())
        .map(|disk| DiscoveredVolume {
            mount_point: PathBuf::from(format!("{}\\", disk.device_id)),
            device: Some(disk.device_id),
            label: disk.volume_name.filter(|name| !name.is_empty()),
            filesystem: disk.file_system,
            size_bytes: disk.size,
        })
        .collect();
    volumes.sort_by(|left, right| left.device.cmp(&right.device));
    Ok(volumes)
}
