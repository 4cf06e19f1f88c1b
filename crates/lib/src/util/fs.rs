//! Directory tree helpers.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, creating `dst` and any missing parents.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
  fs::create_dir_all(dst)?;

  for entry in WalkDir::new(src).follow_links(true) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    if rel.as_os_str().is_empty() {
      continue;
    }

    let target = dst.join(rel);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::copy(entry.path(), &target)?;
    }
  }

  Ok(())
}

/// Remove a directory tree, clearing read-only flags if the first attempt is denied.
///
/// A missing directory is not an error.
pub fn remove_tree(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
      for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
        let mut perms = entry.metadata().map_err(io::Error::other)?.permissions();
        if perms.readonly() {
          #[allow(clippy::permissions_set_readonly_false)]
          perms.set_readonly(false);
          fs::set_permissions(entry.path(), perms)?;
        }
      }
      fs::remove_dir_all(path)
    }
    Err(e) => Err(e),
  }
}
