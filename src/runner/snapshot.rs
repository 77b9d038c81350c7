//! Node state snapshots
//!
//! A snapshot is a full recursive copy of a node's data directory,
//! taken before risky changes. Permissions are carried over and
//! symlinks are recreated rather than followed.

use crate::error::{SamulatorError, SamulatorResult};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Fresh, labelled snapshot location under `scratch_root`
pub fn generate_snapshot_path(scratch_root: &Path, label: &str) -> PathBuf {
    scratch_root.join(format!("samulator_{}_{}", label, Uuid::new_v4().simple()))
}

/// Recursively copy `src` into `dst`, which must not exist yet
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> SamulatorResult<()> {
    let meta = fs::metadata(src)
        .map_err(|e| SamulatorError::io(format!("reading node state {}", src.display()), e))?;
    if !meta.is_dir() {
        return Err(SamulatorError::io(
            format!("node state {} is not a directory", src.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        ));
    }

    fs::create_dir(dst)
        .map_err(|e| SamulatorError::io(format!("creating snapshot {}", dst.display()), e))?;

    let entries = fs::read_dir(src)
        .map_err(|e| SamulatorError::io(format!("reading directory {}", src.display()), e))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| SamulatorError::io(format!("reading entry in {}", src.display()), e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| SamulatorError::io(format!("reading type of {}", from.display()), e))?;

        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            // fs::copy carries the permission bits over
            fs::copy(&from, &to).map_err(|e| {
                SamulatorError::io(format!("copying {} -> {}", from.display(), to.display()), e)
            })?;
        }
    }

    // Applied last so read-only directories can still be filled
    fs::set_permissions(dst, meta.permissions())
        .map_err(|e| SamulatorError::io(format!("setting permissions on {}", dst.display()), e))?;

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> SamulatorResult<()> {
    let target = fs::read_link(from)
        .map_err(|e| SamulatorError::io(format!("reading link {}", from.display()), e))?;
    std::os::unix::fs::symlink(&target, to)
        .map_err(|e| SamulatorError::io(format!("creating link {}", to.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> SamulatorResult<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| SamulatorError::io(format!("copying {} -> {}", from.display(), to.display()), e))
}
