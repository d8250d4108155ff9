//! fsync helpers.
//!
//! A rename or unlink only survives power loss once the containing directory
//! has been synced as well, so every durable write syncs both the file and
//! its parent directory.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory so that entries created, renamed or removed in it are
/// durable.
///
/// # Errors
///
/// Returns an error if the directory cannot be opened or the sync fails.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

/// Syncs the directory containing `path`, if it has one.
pub fn fsync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fsync_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn fsync_file_after_write() {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join("stats.json")).unwrap();
        file.write_all(b"{}").unwrap();

        fsync_file(&file).unwrap();
    }

    #[test]
    fn fsync_parent_of_file_in_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        File::create(&path).unwrap();

        fsync_parent(&path).unwrap();
    }

    #[test]
    fn fsync_parent_of_bare_file_name_is_noop() {
        fsync_parent(Path::new("stats.json")).unwrap();
    }

    #[test]
    fn fsync_dir_fails_on_nonexistent() {
        assert!(fsync_dir(Path::new("/nonexistent/ota-merge/state")).is_err());
    }
}
