//! Hardlink-based directory copies.
//!
//! The destination must not exist; it is created as a tree whose regular
//! files share storage with the source.

use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::process::Command;

use walkdir::WalkDir;

use crate::error::{io_err, RotateError};
use crate::settings::LinkCopyKind;

/// Copy primitive used for promotion and snapshot creation.
pub trait LinkCopy: Debug + Send + Sync {
    fn copy(&self, src: &Path, dest: &Path) -> Result<(), RotateError>;
}

/// Build the copier selected in settings.
pub fn from_kind(kind: LinkCopyKind) -> Box<dyn LinkCopy> {
    match kind {
        LinkCopyKind::Cp => Box::new(CpLinkCopy),
        LinkCopyKind::Native => Box::new(NativeLinkCopy),
    }
}

/// Shells out to `cp -al`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpLinkCopy;

impl LinkCopy for CpLinkCopy {
    fn copy(&self, src: &Path, dest: &Path) -> Result<(), RotateError> {
        let output = Command::new("cp")
            .arg("-al")
            .arg(src)
            .arg(dest)
            .output()
            .map_err(|e| io_err("cp", e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            let message = if stderr.trim().is_empty() {
                format!("cp exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(RotateError::Copy {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                message,
            });
        }
        Ok(())
    }
}

/// Recreates the directory tree in-process and hardlinks every file.
///
/// Symlinks are recreated, not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLinkCopy;

impl LinkCopy for NativeLinkCopy {
    fn copy(&self, src: &Path, dest: &Path) -> Result<(), RotateError> {
        if !src.is_dir() {
            return Err(RotateError::Copy {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                message: "source is not a directory".to_string(),
            });
        }
        if dest.exists() {
            return Err(RotateError::Copy {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                message: "destination already exists".to_string(),
            });
        }

        // Directory modes are applied last so read-only sources stay fillable.
        let mut dir_modes = Vec::new();
        for entry in WalkDir::new(src).follow_links(false) {
            let entry = entry?;
            let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
            let target = dest.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
                dir_modes.push((target, entry.metadata()?.permissions()));
            } else if file_type.is_symlink() {
                let link = fs::read_link(entry.path()).map_err(|e| io_err(entry.path(), e))?;
                symlink(&link, &target).map_err(|e| io_err(&target, e))?;
            } else {
                fs::hard_link(entry.path(), &target).map_err(|e| io_err(&target, e))?;
            }
        }
        for (target, permissions) in dir_modes.into_iter().rev() {
            fs::set_permissions(&target, permissions).map_err(|e| io_err(&target, e))?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are only recreated on unix",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("nested")).expect("mkdir");
        fs::write(root.join("top.txt"), b"top").expect("write");
        fs::write(root.join("nested/inner.txt"), b"inner").expect("write");
    }

    #[cfg(unix)]
    fn inode(path: &Path) -> u64 {
        use std::os::unix::fs::MetadataExt;
        fs::metadata(path).expect("metadata").ino()
    }

    #[cfg(unix)]
    #[test]
    fn native_copy_shares_inodes() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        populate(&src);

        NativeLinkCopy.copy(&src, &dest).expect("copy");
        assert_eq!(inode(&src.join("top.txt")), inode(&dest.join("top.txt")));
        assert_eq!(
            inode(&src.join("nested/inner.txt")),
            inode(&dest.join("nested/inner.txt"))
        );
    }

    #[test]
    fn native_copy_refuses_existing_destination() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        populate(&src);
        fs::create_dir_all(&dest).expect("mkdir");

        let err = NativeLinkCopy.copy(&src, &dest).unwrap_err();
        assert!(matches!(err, RotateError::Copy { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn cp_copy_reports_missing_source() {
        let dir = TempDir::new().expect("tempdir");
        let err = CpLinkCopy
            .copy(&dir.path().join("absent"), &dir.path().join("dest"))
            .unwrap_err();
        assert!(matches!(err, RotateError::Copy { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn removing_a_copied_file_keeps_the_source() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        populate(&src);

        CpLinkCopy.copy(&src, &dest).expect("copy");
        fs::remove_file(dest.join("top.txt")).expect("remove");
        assert_eq!(fs::read(src.join("top.txt")).expect("read"), b"top");
    }
}
