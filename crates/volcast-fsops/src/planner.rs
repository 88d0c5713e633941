//! Source directory scanning.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{FilePlan, SourceFile};

/// Builds the ordered file plan for a run.
pub struct CopyPlanner;

impl CopyPlanner {
    /// List the regular files directly inside `source_dir`.
    ///
    /// Subdirectories are ignored and symbolic links are followed, so a link to
    /// a regular file is planned while a dangling link is skipped. Files are
    /// ordered by name so every volume receives them in the same sequence.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::SourceUnavailable`] when the directory cannot be
    /// listed.
    pub fn plan(source_dir: &Path) -> FsOpsResult<FilePlan> {
        let entries = fs::read_dir(source_dir)
            .map_err(|source| FsOpsError::source_unavailable(source_dir, source))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| FsOpsError::source_unavailable(source_dir, source))?;
            let path = entry.path();
            match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => files.push(SourceFile {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path,
                }),
                Ok(_) => {}
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable source entry");
                }
            }
        }
        files.sort_by(|left, right| left.path.cmp(&right.path));

        debug!(
            source = %source_dir.display(),
            files = files.len(),
            "planned source files"
        );
        Ok(FilePlan::new(source_dir.to_path_buf(), files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use anyhow::Result;

    #[test]
    fn plans_top_level_regular_files_in_name_order() -> Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("b.mkv"), b"b")?;
        fs::write(temp.path().join("a.mkv"), b"a")?;
        fs::create_dir(temp.path().join("extras"))?;
        fs::write(temp.path().join("extras").join("nested.mkv"), b"n")?;

        let plan = CopyPlanner::plan(temp.path())?;
        let names: Vec<_> = plan.files().iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, vec!["a.mkv", "b.mkv"]);
        assert_eq!(plan.source_dir(), temp.path());
        Ok(())
    }

    #[test]
    fn empty_directory_yields_empty_plan() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let plan = CopyPlanner::plan(temp.path())?;
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
        Ok(())
    }

    #[test]
    fn missing_directory_is_source_unavailable() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let err = match CopyPlanner::plan(&temp.path().join("missing")) {
            Ok(_) => anyhow::bail!("expected planning to fail"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        Ok(())
    }

    #[test]
    fn file_path_is_source_unavailable() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"x")?;
        assert!(matches!(
            CopyPlanner::plan(&file),
            Err(FsOpsError::SourceUnavailable { .. })
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_followed_and_dangling_links_skipped() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let outside = tempfile::tempdir()?;
        let target = outside.path().join("real.mkv");
        fs::write(&target, b"r")?;
        std::os::unix::fs::symlink(&target, temp.path().join("linked.mkv"))?;
        std::os::unix::fs::symlink(outside.path().join("gone"), temp.path().join("dangling"))?;

        let plan = CopyPlanner::plan(temp.path())?;
        let names: Vec<_> = plan.files().iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, vec!["linked.mkv"]);
        Ok(())
    }
}
