//! Platform relabelling tools.
//!
//! # Design
//! - Linux resolves the backing device and filesystem with `findmnt`, then
//!   dispatches to the filesystem's own labelling tool.
//! - macOS uses `diskutil rename`, which handles every supported filesystem.
//! - Windows runs `label` against the drive letter of a drive root.
//! - Length limits are checked before any tool runs so the failure reason is
//!   specific.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tracing::debug;
use volcast_fsops::{FsOpsError, FsOpsResult, UnsupportedLabeler, VolumeLabeler};

/// A labelling command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCommand {
    /// Program to execute.
    pub program: &'static str,
    /// Arguments in order.
    pub args: Vec<String>,
}

/// Build the command that applies `label` to `device` formatted as `fstype`.
///
/// # Errors
///
/// Returns the failure reason: `label_too_long` when the filesystem cannot
/// hold the label, `unsupported_filesystem` when no tool is known.
pub fn linux_label_command(
    fstype: &str,
    device: &str,
    label: &str,
) -> Result<LabelCommand, &'static str> {
    let (program, max_chars) = match fstype {
        "vfat" | "fat" | "msdos" | "fat16" | "fat32" => ("fatlabel", 11),
        "exfat" => ("exfatlabel", 15),
        "ext2" | "ext3" | "ext4" => ("e2label", 16),
        "ntfs" | "ntfs3" => ("ntfslabel", 32),
        _ => return Err("unsupported_filesystem"),
    };
    if label.chars().count() > max_chars {
        return Err("label_too_long");
    }
    Ok(LabelCommand {
        program,
        args: vec![device.to_string(), label.to_string()],
    })
}

/// Parse `findmnt -n -o SOURCE,FSTYPE` output into `(device, fstype)`.
#[must_use]
pub fn parse_findmnt(stdout: &str) -> Option<(String, String)> {
    let mut fields = stdout.lines().next()?.split_whitespace();
    let device = fields.next()?;
    let fstype = fields.next()?;
    Some((device.to_string(), fstype.to_string()))
}

/// Relabels Linux volumes through the filesystem-specific tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxLabeler;

impl VolumeLabeler for LinuxLabeler {
    fn relabel(&self, root: &Path, identifier: &str, label: &str) -> FsOpsResult<()> {
        let Some(root_str) = root.to_str() else {
            return Err(FsOpsError::relabel(identifier, label, "non_utf8_mount", None));
        };
        // `--mountpoint` only matches an exact mount, so a plain directory never
        // resolves to the host filesystem.
        let stdout = run_labeler_tool(
            identifier,
            label,
            "findmnt",
            &["-n", "-o", "SOURCE,FSTYPE", "--mountpoint", root_str],
        )?;
        let Some((device, fstype)) = parse_findmnt(&stdout) else {
            return Err(FsOpsError::relabel(
                identifier,
                label,
                "not_a_mount_point",
                None,
            ));
        };
        let command = linux_label_command(&fstype, &device, label).map_err(|reason| {
            FsOpsError::relabel(identifier, label, reason, Some(fstype.clone()))
        })?;
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        run_labeler_tool(identifier, label, command.program, &args)?;
        Ok(())
    }
}

/// Relabels macOS volumes with `diskutil rename`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskutilLabeler;

impl VolumeLabeler for DiskutilLabeler {
    fn relabel(&self, root: &Path, identifier: &str, label: &str) -> FsOpsResult<()> {
        let Some(root_str) = root.to_str() else {
            return Err(FsOpsError::relabel(identifier, label, "non_utf8_mount", None));
        };
        run_labeler_tool(identifier, label, "diskutil", &["rename", root_str, label])?;
        Ok(())
    }
}

/// Build the `label` command for the drive whose root is `root` (`E:\`).
///
/// # Errors
///
/// Returns `not_a_drive_root` when `root` is not a bare drive root and
/// `label_too_long` past the NTFS limit. Narrower FAT limits are reported by
/// the tool itself.
pub fn windows_label_command(root: &str, label: &str) -> Result<LabelCommand, &'static str> {
    let mut chars = root.chars();
    let drive = match (chars.next(), chars.next(), chars.as_str()) {
        (Some(letter), Some(':'), "" | "\\" | "/") if letter.is_ascii_alphabetic() => {
            format!("{}:", letter.to_ascii_uppercase())
        }
        _ => return Err("not_a_drive_root"),
    };
    if label.chars().count() > 32 {
        return Err("label_too_long");
    }
    Ok(LabelCommand {
        program: "label",
        args: vec![drive, label.to_string()],
    })
}

/// Relabels Windows drives with the `label` tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsLabeler;

impl VolumeLabeler for WindowsLabeler {
    fn relabel(&self, root: &Path, identifier: &str, label: &str) -> FsOpsResult<()> {
        let Some(root_str) = root.to_str() else {
            return Err(FsOpsError::relabel(identifier, label, "non_utf8_mount", None));
        };
        let command = windows_label_command(root_str, label)
            .map_err(|reason| FsOpsError::relabel(identifier, label, reason, None))?;
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        run_labeler_tool(identifier, label, command.program, &args)?;
        Ok(())
    }
}

/// Select the labeler for the running platform; relabelling reports
/// `unsupported` elsewhere.
#[must_use]
pub fn platform_labeler() -> Arc<dyn VolumeLabeler> {
    match std::env::consts::OS {
        "linux" => Arc::new(LinuxLabeler),
        "macos" => Arc::new(DiskutilLabeler),
        "windows" => Arc::new(WindowsLabeler),
        _ => Arc::new(UnsupportedLabeler),
    }
}

fn run_labeler_tool(
    identifier: &str,
    label: &str,
    program: &str,
    args: &[&str],
) -> FsOpsResult<String> {
    debug!(volume = identifier, program, ?args, "running label tool");
    let output = Command::new(program).args(args).output().map_err(|err| {
        FsOpsError::relabel(
            identifier,
            label,
            "tool_unavailable",
            Some(format!("{program}: {err}")),
        )
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(FsOpsError::relabel(
            identifier,
            label,
            "tool_failed",
            Some(format!("{program}: {stderr}")),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
