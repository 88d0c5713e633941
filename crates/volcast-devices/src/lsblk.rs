//! Linux discovery through `lsblk --json`.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::discovery::{DiscoveredVolume, VolumeDiscovery, run_tool};
use crate::error::{DiscoveryError, DiscoveryResult};

const LSBLK_COLUMNS: &str = "NAME,PATH,RM,HOTPLUG,TYPE,MOUNTPOINT,LABEL,FSTYPE,SIZE";

/// Enumerates mounted partitions of removable or hot-plugged disks.
#[derive(Debug, Default, Clone, Copy)]
pub struct LsblkDiscovery;

impl VolumeDiscovery for LsblkDiscovery {
    fn discover(&self) -> DiscoveryResult<Vec<DiscoveredVolume>> {
        let stdout = run_tool("lsblk", &["--json", "--bytes", "--output", LSBLK_COLUMNS])?;
        parse_lsblk(&stdout)
    }
}

#[derive(Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<BlockDevice>,
}

#[derive(Deserialize)]
struct BlockDevice {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    rm: bool,
    #[serde(default, deserialize_with = "flag")]
    hotplug: bool,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    fstype: Option<String>,
    #[serde(default, deserialize_with = "size")]
    size: Option<u64>,
    #[serde(default)]
    children: Vec<BlockDevice>,
}

/// lsblk reports flags as booleans in recent releases and as `"0"`/`"1"`
/// strings in older ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Number(u64),
    Text(String),
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Bool(value)) => value,
        Some(Loose::Number(value)) => value != 0,
        Some(Loose::Text(value)) => value == "1" || value.eq_ignore_ascii_case("true"),
        None => false,
    })
}

fn size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(value)) => Some(value),
        Some(Loose::Text(value)) => value.parse().ok(),
        Some(Loose::Bool(_)) | None => None,
    })
}

/// Parse `lsblk --json` output into mounted removable volumes, in device order.
///
/// A partition counts as removable when it or its parent disk is flagged
/// removable or hot-pluggable. Swap and unmounted devices are skipped.
///
/// # Errors
///
/// Returns [`DiscoveryError::Json`] for malformed output.
pub fn parse_lsblk(stdout: &[u8]) -> DiscoveryResult<Vec<DiscoveredVolume>> {
    let output: LsblkOutput =
        serde_json::from_slice(stdout).map_err(|source| DiscoveryError::Json { source })?;
    let mut volumes = Vec::new();
    for device in &output.blockdevices {
        collect(device, false, &mut volumes);
    }
    Ok(volumes)
}

fn collect(device: &BlockDevice, parent_removable: bool, volumes: &mut Vec<DiscoveredVolume>) {
    let removable = parent_removable || device.rm || device.hotplug;
    let is_volume_type = matches!(device.kind.as_deref(), Some("part" | "disk") | None);
    if removable
        && is_volume_type
        && let Some(mountpoint) = device
            .mountpoint
            .as_deref()
            .filter(|mountpoint| mountpoint.starts_with('/'))
    {
        volumes.push(DiscoveredVolume {
            mount_point: PathBuf::from(mountpoint),
            device: Some(
                device
                    .path
                    .clone()
                    .unwrap_or_else(|| format!("/dev/{}", device.name)),
            ),
            label: device.label.clone(),
            filesystem: device.fstype.clone(),
            size_bytes: device.size,
        });
    }
    for child in &device.children {
        collect(child, removable, volumes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const MODERN: &str = r#"{
       "blockdevices": [
          {"name":"nvme0n1", "path":"/dev/nvme0n1", "rm":false, "hotplug":false, "type":"disk",
           "mountpoint":null, "label":null, "fstype":null, "size":512110190592,
           "children": [
              {"name":"nvme0n1p1", "path":"/dev/nvme0n1p1", "rm":false, "hotplug":false, "type":"part",
               "mountpoint":"/", "label":null, "fstype":"ext4", "size":511000000000},
              {"name":"nvme0n1p2", "path":"/dev/nvme0n1p2", "rm":false, "hotplug":false, "type":"part",
               "mountpoint":"[SWAP]", "label":null, "fstype":"swap", "size":1000000000}
           ]
          },
          {"name":"sdb", "path":"/dev/sdb", "rm":true, "hotplug":true, "type":"disk",
           "mountpoint":null, "label":null, "fstype":null, "size":31037849600,
           "children": [
              {"name":"sdb1", "path":"/dev/sdb1", "rm":true, "hotplug":true, "type":"part",
               "mountpoint":"/media/user/STICK", "label":"STICK", "fstype":"vfat", "size":31036800000}
           ]
          },
          {"name":"sdc", "path":"/dev/sdc", "rm":false, "hotplug":true, "type":"disk",
           "mountpoint":null, "label":null, "fstype":null, "size":64000000000,
           "children": [
              {"name":"sdc1", "path":"/dev/sdc1", "rm":false, "hotplug":false, "type":"part",
               "mountpoint":"/media/user/CARD", "label":"CARD", "fstype":"exfat", "size":63999000000},
              {"name":"sdc2", "path":"/dev/sdc2", "rm":false, "hotplug":false, "type":"part",
               "mountpoint":null, "label":null, "fstype":"ext4", "size":1000000}
           ]
          }
       ]
    }"#;

    const LEGACY: &str = r#"{
       "blockdevices": [
          {"name":"sdb", "rm":"1", "hotplug":"1", "type":"disk", "mountpoint":"/run/media/u/RAW",
           "label":"RAW", "fstype":"vfat", "size":"8000000000"}
       ]
    }"#;

    #[test]
    fn modern_output_yields_removable_mounted_partitions() -> Result<()> {
        let volumes = parse_lsblk(MODERN.as_bytes())?;
        let mounts: Vec<_> = volumes
            .iter()
            .map(|volume| volume.mount_point.display().to_string())
            .collect();
        assert_eq!(mounts, vec!["/media/user/STICK", "/media/user/CARD"]);
        assert_eq!(volumes[0].device.as_deref(), Some("/dev/sdb1"));
        assert_eq!(volumes[0].filesystem.as_deref(), Some("vfat"));
        assert_eq!(volumes[1].size_bytes, Some(63_999_000_000));
        Ok(())
    }

    #[test]
    fn legacy_string_flags_are_understood() -> Result<()> {
        let volumes = parse_lsblk(LEGACY.as_bytes())?;
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].device.as_deref(), Some("/dev/sdb"));
        assert_eq!(volumes[0].size_bytes, Some(8_000_000_000));
        assert_eq!(volumes[0].label.as_deref(), Some("RAW"));
        Ok(())
    }

    #[test]
    fn malformed_output_is_a_json_error() {
        assert!(matches!(
            parse_lsblk(b"not json"),
            Err(DiscoveryError::Json { .. })
        ));
    }

    #[test]
    fn empty_listing_is_fine() -> Result<()> {
        assert!(parse_lsblk(br#"{"blockdevices": []}"#)?.is_empty());
        Ok(())
    }
}
