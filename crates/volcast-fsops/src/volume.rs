//! Volume abstraction and the filesystem-backed implementation.
//!
//! # Design
//! - [`VolumeHandle`] is the seam between the pipeline and a concrete volume;
//!   tests substitute flaky or recording handles.
//! - Relabelling is platform specific and delegated to a [`VolumeLabeler`].

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{FsOpsError, FsOpsResult};

/// Operations the pipeline performs against one volume.
pub trait VolumeHandle: Send + Sync {
    /// Opaque identifier (mount root or device path) used in reports.
    fn identifier(&self) -> &str;

    /// Mount root the destination directory is created under.
    fn root(&self) -> &Path;

    /// Create `{root}/{relative_name}` if absent and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::DestinationUnwritable`] when the directory cannot
    /// be created or the volume is mounted read-only.
    fn ensure_directory(&self, relative_name: &str) -> FsOpsResult<PathBuf>;

    /// Copy `source_file` into `destination_dir`, replacing an existing file of
    /// the same name, and return the destination path.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::CopyFailed`] for any IO failure.
    fn copy_into(&self, source_file: &Path, destination_dir: &Path) -> FsOpsResult<PathBuf>;

    /// Restrict `path` to owner read-only.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::PermissionChangeFailed`] when the change fails.
    fn set_read_only(&self, path: &Path) -> FsOpsResult<()>;

    /// Apply `label` to the volume.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::RelabelFailed`] when the label is invalid or the
    /// platform tool fails.
    fn set_label(&self, label: &str) -> FsOpsResult<()>;
}

/// Platform-specific relabelling strategy.
pub trait VolumeLabeler: Send + Sync {
    /// Apply `label` to the volume mounted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::RelabelFailed`] when relabelling fails.
    fn relabel(&self, root: &Path, identifier: &str, label: &str) -> FsOpsResult<()>;
}

/// Labeler used where no relabelling tool is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedLabeler;

impl VolumeLabeler for UnsupportedLabeler {
    fn relabel(&self, _root: &Path, identifier: &str, label: &str) -> FsOpsResult<()> {
        Err(FsOpsError::relabel(identifier, label, "unsupported", None))
    }
}

/// Check a label before handing it to a platform tool.
///
/// # Errors
///
/// Returns [`FsOpsError::RelabelFailed`] with reason `invalid_label` for empty
/// labels or labels containing path separators or control characters.
pub fn validate_label(identifier: &str, label: &str) -> FsOpsResult<()> {
    let invalid = label.trim().is_empty()
        || label
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_control());
    if invalid {
        return Err(FsOpsError::relabel(
            identifier,
            label,
            "invalid_label",
            None,
        ));
    }
    Ok(())
}

/// Volume backed by a mounted filesystem root.
#[derive(Clone)]
pub struct LocalVolume {
    identifier: String,
    root: PathBuf,
    labeler: Arc<dyn VolumeLabeler>,
}

impl fmt::Debug for LocalVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalVolume")
            .field("identifier", &self.identifier)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl LocalVolume {
    /// Volume identified by its mount root. Relabelling is unsupported until a
    /// labeler is attached with [`LocalVolume::with_labeler`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            identifier: root.display().to_string(),
            root,
            labeler: Arc::new(UnsupportedLabeler),
        }
    }

    /// Override the identifier reported for this volume (for example a device path).
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Attach a relabelling strategy.
    #[must_use]
    pub fn with_labeler(mut self, labeler: Arc<dyn VolumeLabeler>) -> Self {
        self.labeler = labeler;
        self
    }

    #[cfg(unix)]
    fn mounted_read_only(&self) -> bool {
        use nix::sys::statvfs::{FsFlags, statvfs};

        statvfs(self.root.as_path())
            .map(|stats| stats.flags().contains(FsFlags::ST_RDONLY))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    const fn mounted_read_only(&self) -> bool {
        false
    }
}

impl VolumeHandle for LocalVolume {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_directory(&self, relative_name: &str) -> FsOpsResult<PathBuf> {
        let destination = self.root.join(relative_name);
        // A missing root means the volume went away; never recreate it on the
        // host filesystem.
        if !self.root.is_dir() {
            return Err(FsOpsError::destination_unwritable(
                &self.identifier,
                destination,
                "volume_missing",
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        if self.mounted_read_only() {
            return Err(FsOpsError::destination_unwritable(
                &self.identifier,
                destination,
                "read_only_mount",
                io::Error::from(io::ErrorKind::ReadOnlyFilesystem),
            ));
        }
        fs::create_dir_all(&destination).map_err(|source| {
            FsOpsError::destination_unwritable(&self.identifier, &destination, "create_dir", source)
        })?;
        debug!(volume = %self.identifier, path = %destination.display(), "destination ready");
        Ok(destination)
    }

    fn copy_into(&self, source_file: &Path, destination_dir: &Path) -> FsOpsResult<PathBuf> {
        let Some(file_name) = source_file.file_name() else {
            return Err(FsOpsError::copy_failed(
                &self.identifier,
                destination_dir,
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        };
        let target = destination_dir.join(file_name);

        if let Ok(existing) = fs::symlink_metadata(&target) {
            if existing.permissions().readonly() {
                make_writable(&target, existing.permissions())
                    .map_err(|source| FsOpsError::copy_failed(&self.identifier, &target, source))?;
            }
            fs::remove_file(&target)
                .map_err(|source| FsOpsError::copy_failed(&self.identifier, &target, source))?;
        }

        fs::copy(source_file, &target)
            .map_err(|source| FsOpsError::copy_failed(&self.identifier, &target, source))?;

        if let Err(err) = preserve_modified(source_file, &target) {
            debug!(
                volume = %self.identifier,
                path = %target.display(),
                error = %err,
                "modification time not preserved"
            );
        }
        Ok(target)
    }

    fn set_read_only(&self, path: &Path) -> FsOpsResult<()> {
        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            fs::Permissions::from_mode(0o400)
        };
        #[cfg(not(unix))]
        let permissions = {
            let mut permissions = fs::metadata(path)
                .map_err(|source| FsOpsError::permission(path, source))?
                .permissions();
            permissions.set_readonly(true);
            permissions
        };
        fs::set_permissions(path, permissions).map_err(|source| FsOpsError::permission(path, source))
    }

    fn set_label(&self, label: &str) -> FsOpsResult<()> {
        validate_label(&self.identifier, label)?;
        self.labeler.relabel(&self.root, &self.identifier, label)?;
        info!(volume = %self.identifier, label, "volume relabelled");
        Ok(())
    }
}

#[cfg(unix)]
fn make_writable(path: &Path, permissions: fs::Permissions) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = permissions.mode() | 0o200;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn make_writable(path: &Path, mut permissions: fs::Permissions) -> io::Result<()> {
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

/// `fs::copy` carries the source permission bits over, so the target may
/// already be read-only here. Timestamps are set through a handle that needs no
/// write access to the contents.
fn preserve_modified(source_file: &Path, target: &Path) -> io::Result<()> {
    let modified = fs::metadata(source_file)?.modified()?;
    timestamp_handle(target)?.set_modified(modified)
}

#[cfg(unix)]
fn timestamp_handle(target: &Path) -> io::Result<File> {
    // futimens only requires ownership of the file.
    File::open(target)
}

#[cfg(windows)]
fn timestamp_handle(target: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    File::options()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .open(target)
}

#[cfg(not(any(unix, windows)))]
fn timestamp_handle(target: &Path) -> io::Result<File> {
    File::options().write(true).open(target)
}
