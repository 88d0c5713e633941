#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Removable volume discovery and relabelling.
//!
//! Discovery shells out to the platform's own tools (`lsblk` on Linux,
//! `diskutil` on macOS, a PowerShell CIM query on Windows) and parses their
//! structured output. Relabelling
//! implements the copy pipeline's `VolumeLabeler` seam.

pub mod discovery;
pub mod diskutil;
pub mod error;
pub mod labeler;
pub mod logical_disk;
pub mod lsblk;

pub use discovery::{DiscoveredVolume, StaticDiscovery, VolumeDiscovery, platform_discovery};
pub use diskutil::{DiskutilDiscovery, DiskutilInfo, parse_diskutil_info, volume_from_info};
pub use error::{DiscoveryError, DiscoveryResult};
pub use labeler::{
    DiskutilLabeler, LabelCommand, LinuxLabeler, WindowsLabeler, linux_label_command,
    parse_findmnt, platform_labeler, windows_label_command,
};
pub use logical_disk::{LogicalDiskDiscovery, parse_logical_disks};
pub use lsblk::{LsblkDiscovery, parse_lsblk};
