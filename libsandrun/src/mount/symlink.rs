//! Resolves a mount destination relative to a container root, the way the
//! sandbox kernel would see it, without ever leaving `root` on the host.

use std::path::{Component, Path, PathBuf};

use super::MountError;

const MAX_SYMLINK_DEPTH: u32 = 255;

/// Walks `rel` component by component starting from `root`, following
/// symlinks and clamping `..` so the result can never escape `root`.
///
/// Missing path components are not an error: the walk stops cleanly so the
/// caller can create the remaining components as a fresh mount point.
pub fn resolve(root: &Path, rel: &Path) -> Result<PathBuf, MountError> {
    resolve_budgeted(root, rel, MAX_SYMLINK_DEPTH)
}

fn resolve_budgeted(root: &Path, rel: &Path, budget: u32) -> Result<PathBuf, MountError> {
    if budget == 0 {
        return Err(MountError::TooManySymlinks);
    }

    let mut current = root.to_path_buf();
    let mut budget = budget;

    for component in rel.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => continue,
            Component::CurDir => continue,
            Component::ParentDir => {
                current.pop();
                clamp(&mut current, root);
            }
            Component::Normal(part) => {
                current.push(part);
                clamp(&mut current, root);

                let metadata = match std::fs::symlink_metadata(&current) {
                    Ok(m) => m,
                    Err(_) => return Ok(current),
                };

                if metadata.file_type().is_symlink() {
                    budget -= 1;
                    if budget == 0 {
                        return Err(MountError::TooManySymlinks);
                    }

                    let target = std::fs::read_link(&current)
                        .map_err(|source| MountError::ResolveFailed {
                            path: current.clone(),
                            source,
                        })?;

                    let resolved = if target.is_absolute() {
                        resolve_budgeted(root, target.strip_prefix("/").unwrap_or(&target), budget)?
                    } else {
                        let parent = current.parent().unwrap_or(root).to_path_buf();
                        let parent_rel = parent.strip_prefix(root).unwrap_or(Path::new(""));
                        resolve_budgeted(root, &parent_rel.join(&target), budget)?
                    };

                    current = resolved;
                }
            }
        }
    }

    Ok(current)
}

/// If `path` no longer has `root` as a prefix, reset it to `root`.
fn clamp(path: &mut PathBuf, root: &Path) {
    if !path.starts_with(root) {
        *path = root.to_path_buf();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn clamps_parent_escapes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("etc")).unwrap();
        symlink("../../etc", root.join("a")).unwrap();

        let resolved = resolve(root, Path::new("a/passwd")).unwrap();
        assert_eq!(resolved, root.join("etc/passwd"));
    }

    #[test]
    fn self_referential_symlink_hits_budget() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        symlink("loop", root.join("loop")).unwrap();

        let err = resolve(root, Path::new("loop")).unwrap_err();
        assert!(matches!(err, MountError::TooManySymlinks));
    }

    #[test]
    fn missing_component_terminates_cleanly() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let resolved = resolve(root, Path::new("does/not/exist")).unwrap();
        assert_eq!(resolved, root.join("does/not/exist"));
    }

    #[test]
    fn plain_relative_path_resolves_under_root() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("data")).unwrap();
        let resolved = resolve(root, Path::new("data/mnt")).unwrap();
        assert_eq!(resolved, root.join("data/mnt"));
    }
}
