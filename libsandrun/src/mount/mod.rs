//! Prepares a container's view of the host filesystem before the sandbox or
//! gofer opens it: resolves bind-mount destinations under the container
//! root, creates missing mount points, and performs the bind mounts.

mod symlink;

use std::path::{Path, PathBuf};

use nix::mount::MsFlags;
use oci_spec::runtime::{Mount, Spec};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("mount source missing: {0:?}")]
    SourceMissing(PathBuf),
    #[error("failed to resolve mount destination at {path:?}: {source}")]
    ResolveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("too many symlinks while resolving mount destination")]
    TooManySymlinks,
    #[error("failed to create mount point {0:?}: {1}")]
    CreateMountPoint(PathBuf, #[source] std::io::Error),
    #[error("mount syscall failed for {target:?}: {source}")]
    MountSyscall {
        target: PathBuf,
        #[source]
        source: nix::Error,
    },
    #[error("missing root path in spec")]
    MissingRoot,
}

type Result<T> = std::result::Result<T, MountError>;

enum Action {
    Set,
    Clear,
}

/// Exact option table from the external interface definition: name -> (action, flag bits).
fn option_table(name: &str) -> Option<(Action, MsFlags)> {
    use Action::*;
    Some(match name {
        "acl" => (Set, MsFlags::MS_POSIXACL),
        "async" => (Clear, MsFlags::MS_SYNCHRONOUS),
        "atime" => (Clear, MsFlags::MS_NOATIME),
        "bind" => (Set, MsFlags::MS_BIND),
        "defaults" => (Set, MsFlags::empty()),
        "dev" => (Clear, MsFlags::MS_NODEV),
        "diratime" => (Clear, MsFlags::MS_NODIRATIME),
        "dirsync" => (Set, MsFlags::MS_DIRSYNC),
        "exec" => (Clear, MsFlags::MS_NOEXEC),
        "iversion" => (Set, MsFlags::MS_I_VERSION),
        "loud" => (Clear, MsFlags::MS_SILENT),
        "mand" => (Set, MsFlags::MS_MANDLOCK),
        "noacl" => (Clear, MsFlags::MS_POSIXACL),
        "noatime" => (Set, MsFlags::MS_NOATIME),
        "nodev" => (Set, MsFlags::MS_NODEV),
        "nodiratime" => (Set, MsFlags::MS_NODIRATIME),
        "noexec" => (Set, MsFlags::MS_NOEXEC),
        "noiversion" => (Clear, MsFlags::MS_I_VERSION),
        "nomand" => (Clear, MsFlags::MS_MANDLOCK),
        "norelatime" => (Clear, MsFlags::MS_RELATIME),
        "nostrictatime" => (Clear, MsFlags::MS_STRICTATIME),
        "nosuid" => (Set, MsFlags::MS_NOSUID),
        "private" => (Set, MsFlags::MS_PRIVATE),
        "rbind" => (Set, MsFlags::MS_BIND | MsFlags::MS_REC),
        "relatime" => (Set, MsFlags::MS_RELATIME),
        "remount" => (Set, MsFlags::MS_REMOUNT),
        "ro" => (Set, MsFlags::MS_RDONLY),
        "rprivate" => (Set, MsFlags::MS_PRIVATE | MsFlags::MS_REC),
        "rw" => (Clear, MsFlags::MS_RDONLY),
        "silent" => (Set, MsFlags::MS_SILENT),
        "strictatime" => (Set, MsFlags::MS_STRICTATIME),
        "suid" => (Clear, MsFlags::MS_NOSUID),
        "sync" => (Set, MsFlags::MS_SYNCHRONOUS),
        _ => return None,
    })
}

/// Names recognized by [`option_table`], for callers that need to advertise
/// supported mount options (e.g. the `features` command) without folding them.
pub const KNOWN_OPTIONS: &[&str] = &[
    "acl", "async", "atime", "bind", "defaults", "dev", "diratime", "dirsync", "exec",
    "iversion", "loud", "mand", "noacl", "noatime", "nodev", "nodiratime", "noexec",
    "noiversion", "nomand", "norelatime", "nostrictatime", "nosuid", "private", "rbind",
    "relatime", "remount", "ro", "rprivate", "rw", "silent", "strictatime", "suid", "sync",
];

/// Folds a list of OCI mount option strings into kernel mount flags.
/// Unknown options are logged and skipped, not fatal.
pub fn options_to_flags(options: &[String]) -> MsFlags {
    let mut flags = MsFlags::empty();
    for option in options {
        match option_table(option) {
            Some((Action::Set, bits)) => flags |= bits,
            Some((Action::Clear, bits)) => flags &= !bits,
            None => warn!(option, "unknown mount option, ignoring"),
        }
    }
    flags
}

/// Host bind-mount and filesystem-attach primitive, narrowed to the two
/// syscalls the mount preparer needs. Kept as a trait so tests never touch
/// the real mount table.
pub trait MountSyscall {
    fn bind_mount(
        &self,
        source: &Path,
        target: &Path,
        flags: MsFlags,
    ) -> std::result::Result<(), nix::Error>;

    fn remount_readonly(&self, target: &Path) -> std::result::Result<(), nix::Error>;
}

pub struct LinuxMountSyscall;

impl MountSyscall for LinuxMountSyscall {
    fn bind_mount(
        &self,
        source: &Path,
        target: &Path,
        flags: MsFlags,
    ) -> std::result::Result<(), nix::Error> {
        nix::mount::mount(Some(source), target, None::<&str>, flags, None::<&str>)
    }

    fn remount_readonly(&self, target: &Path) -> std::result::Result<(), nix::Error> {
        let flags = MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY | MsFlags::MS_REC;
        nix::mount::mount(None::<&str>, target, None::<&str>, flags, None::<&str>)
    }
}

fn is_supported_mount(mount: &Mount) -> bool {
    mount.typ().as_deref() == Some("bind")
}

fn create_mount_point(source: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        return Ok(());
    }

    let source_is_dir = source.is_dir();
    if source_is_dir {
        std::fs::create_dir_all(destination)
            .map_err(|e| MountError::CreateMountPoint(destination.to_path_buf(), e))?;
        std::fs::set_permissions(destination, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| MountError::CreateMountPoint(destination.to_path_buf(), e))?;
    } else {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MountError::CreateMountPoint(destination.to_path_buf(), e))?;
        }
        std::fs::File::create(destination)
            .map_err(|e| MountError::CreateMountPoint(destination.to_path_buf(), e))?;
        std::fs::set_permissions(destination, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| MountError::CreateMountPoint(destination.to_path_buf(), e))?;
    }

    Ok(())
}

use std::os::unix::fs::PermissionsExt;

/// Prepares every supported mount in `spec.mounts` against `root_path`,
/// then optionally remounts the root read-only.
pub fn prepare_mounts(
    spec: &Spec,
    bundle_dir: &Path,
    syscall: &dyn MountSyscall,
) -> Result<()> {
    let root = spec.root().as_ref().ok_or(MountError::MissingRoot)?;
    let root_path = if root.path().is_absolute() {
        root.path().clone()
    } else {
        bundle_dir.join(root.path())
    };

    if let Some(mounts) = spec.mounts() {
        for mount in mounts {
            if !is_supported_mount(mount) {
                continue;
            }
            prepare_one(mount, bundle_dir, &root_path, syscall)?;
        }
    }

    if matches!(root.readonly(), Some(true)) {
        syscall
            .remount_readonly(&root_path)
            .map_err(|source| MountError::MountSyscall {
                target: root_path.clone(),
                source,
            })?;
    }

    Ok(())
}

fn prepare_one(
    mount: &Mount,
    bundle_dir: &Path,
    root_path: &Path,
    syscall: &dyn MountSyscall,
) -> Result<()> {
    let source = mount
        .source()
        .as_ref()
        .ok_or_else(|| MountError::SourceMissing(PathBuf::new()))?;
    let source = if source.is_absolute() {
        source.clone()
    } else {
        bundle_dir.join(source)
    };
    if !source.exists() {
        return Err(MountError::SourceMissing(source));
    }

    let dest_rel = mount.destination().strip_prefix("/").unwrap_or(mount.destination());
    let destination = symlink::resolve(root_path, dest_rel)?;

    create_mount_point(&source, &destination)?;

    let options = mount
        .options()
        .clone()
        .unwrap_or_default();
    let flags = options_to_flags(&options) | MsFlags::MS_BIND;

    debug!(?source, ?destination, ?flags, "bind mounting");
    syscall
        .bind_mount(&source, &destination, flags)
        .map_err(|e| MountError::MountSyscall {
            target: destination.clone(),
            source: e,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oci_spec::runtime::{MountBuilder, RootBuilder, SpecBuilder};
    use std::cell::RefCell;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingMountSyscall {
        binds: RefCell<Vec<(PathBuf, PathBuf, MsFlags)>>,
    }

    impl MountSyscall for RecordingMountSyscall {
        fn bind_mount(
            &self,
            source: &Path,
            target: &Path,
            flags: MsFlags,
        ) -> std::result::Result<(), nix::Error> {
            self.binds
                .borrow_mut()
                .push((source.to_path_buf(), target.to_path_buf(), flags));
            Ok(())
        }

        fn remount_readonly(&self, _target: &Path) -> std::result::Result<(), nix::Error> {
            Ok(())
        }
    }

    #[test]
    fn bind_mount_follows_symlinked_destination() {
        let bundle = tempdir().unwrap();
        let root_path = bundle.path().join("rootfs");
        std::fs::create_dir_all(root_path.join("real/data")).unwrap();
        symlink("real/data", root_path.join("data")).unwrap();

        let source_dir = bundle.path().join("src-mnt");
        std::fs::create_dir_all(&source_dir).unwrap();

        let spec = SpecBuilder::default()
            .root(RootBuilder::default().path("rootfs").build().unwrap())
            .mounts(vec![MountBuilder::default()
                .destination(PathBuf::from("/data/mnt"))
                .typ("bind")
                .source(source_dir.clone())
                .options(vec!["rbind".to_string()])
                .build()
                .unwrap()])
            .build()
            .unwrap();

        let syscall = RecordingMountSyscall::default();
        prepare_mounts(&spec, bundle.path(), &syscall).unwrap();

        assert!(root_path.join("real/data/mnt").exists());
        let binds = syscall.binds.borrow();
        assert_eq!(binds.len(), 1);
        let (source, target, flags) = &binds[0];
        assert_eq!(*source, source_dir);
        assert_eq!(*target, root_path.join("real/data/mnt"));
        assert!(flags.contains(MsFlags::MS_BIND));
        assert!(flags.contains(MsFlags::MS_REC));
    }

    #[test]
    fn folds_ro_then_rw_to_nosuid() {
        let options = vec![
            "ro".to_string(),
            "nosuid".to_string(),
            "unknown".to_string(),
            "rw".to_string(),
        ];
        assert_eq!(options_to_flags(&options), MsFlags::MS_NOSUID);
    }

    #[test]
    fn rbind_sets_bind_and_rec() {
        let options = vec!["rbind".to_string()];
        assert_eq!(
            options_to_flags(&options),
            MsFlags::MS_BIND | MsFlags::MS_REC
        );
    }

    #[test]
    fn defaults_is_a_noop() {
        assert_eq!(options_to_flags(&["defaults".to_string()]), MsFlags::empty());
    }
}
