//! Per-container JSON record on disk: `<root_dir>/<id>/meta.json`.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::container::{Container, ContainerStatus};
use crate::error::{ManagerError, Result};

const META_FILE: &str = "meta.json";
const DIR_MODE: u32 = 0o711;
const FILE_MODE: u32 = 0o640;

pub struct MetadataStore {
    root_dir: PathBuf,
}

/// Liveness probe for the sandbox process, injectable so tests can fake a
/// dead PID without sending real signals.
pub trait Liveness {
    fn is_alive(&self, pid: i32) -> bool;
}

pub struct SignalZeroLiveness;

impl Liveness for SignalZeroLiveness {
    fn is_alive(&self, pid: i32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
    }
}

impl MetadataStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.root_dir.join(id)
    }

    /// `root_dir / id` exists iff the container record exists (I4).
    pub fn exists(&self, id: &str) -> bool {
        self.container_dir(id).exists()
    }

    pub fn save(&self, container: &Container) -> Result<()> {
        let dir = self.container_dir(&container.id);
        fs::create_dir_all(&dir).map_err(|source| ManagerError::IOError {
            path: dir.clone(),
            source,
        })?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(DIR_MODE)).map_err(|source| {
            ManagerError::IOError {
                path: dir.clone(),
                source,
            }
        })?;

        let path = dir.join(META_FILE);
        let file = fs::File::create(&path).map_err(|source| ManagerError::IOError {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, container).map_err(|e| ManagerError::IOError {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
        writer.flush().map_err(|source| ManagerError::IOError {
            path: path.clone(),
            source,
        })?;
        fs::set_permissions(&path, fs::Permissions::from_mode(FILE_MODE)).map_err(|source| {
            ManagerError::IOError {
                path: path.clone(),
                source,
            }
        })?;

        Ok(())
    }

    /// Resolves `id_or_prefix` to a single container directory, trying an
    /// exact match first and falling back to unique-prefix resolution.
    fn resolve_dir(&self, id_or_prefix: &str) -> Result<PathBuf> {
        let exact = self.container_dir(id_or_prefix);
        if exact.exists() {
            return Ok(exact);
        }

        let entries = self.list()?;
        let matches: Vec<&String> = entries
            .iter()
            .filter(|name| name.starts_with(id_or_prefix))
            .collect();

        match matches.len() {
            0 => Err(ManagerError::NotFound(id_or_prefix.to_string())),
            1 => Ok(self.container_dir(matches[0])),
            n => Err(ManagerError::Ambiguous(id_or_prefix.to_string(), n)),
        }
    }

    /// Loads and deserializes a container record, reconciling liveness for
    /// `Running`/`Created` records (I5). The reconciled status is never
    /// written back to `meta.json` (see DESIGN.md Open Questions).
    pub fn load(&self, id_or_prefix: &str, liveness: &dyn Liveness) -> Result<Container> {
        let dir = self.resolve_dir(id_or_prefix)?;
        let path = dir.join(META_FILE);
        let file = fs::File::open(&path).map_err(|source| ManagerError::IOError {
            path: path.clone(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut container: Container =
            serde_json::from_reader(reader).map_err(|e| ManagerError::IOError {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;

        if matches!(
            container.status,
            ContainerStatus::Running | ContainerStatus::Created
        ) {
            let alive = container
                .sandbox
                .as_ref()
                .map(|s| liveness.is_alive(s.pid))
                .unwrap_or(false);
            if !alive {
                container.status = ContainerStatus::Stopped;
                container.sandbox = None;
            }
        }

        Ok(container)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let entries = fs::read_dir(&self.root_dir).map_err(|source| ManagerError::IOError {
            path: self.root_dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| ManagerError::IOError {
                path: self.root_dir.clone(),
                source,
            })?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Removes `root_dir / id` recursively. Missing is OK (I6, P7).
    pub fn remove(&self, id: &str) -> Result<()> {
        let dir = self.container_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ManagerError::IOError { path: dir, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SandboxHandle;
    use chrono::Utc;
    use oci_spec::runtime::Spec;
    use tempfile::tempdir;

    struct AlwaysAlive;
    impl Liveness for AlwaysAlive {
        fn is_alive(&self, _pid: i32) -> bool {
            true
        }
    }

    struct NeverAlive;
    impl Liveness for NeverAlive {
        fn is_alive(&self, _pid: i32) -> bool {
            false
        }
    }

    fn sample(id: &str, status: ContainerStatus) -> Container {
        Container {
            id: id.to_string(),
            spec: Spec::default(),
            bundle_dir: PathBuf::from("/bundle"),
            root: PathBuf::from("/root").join(id),
            created_at: Utc::now(),
            owner: "root".to_string(),
            status,
            gofer_pid: 0,
            sandbox: Some(SandboxHandle {
                id: id.to_string(),
                pid: 99999,
                control_endpoint: PathBuf::from("/tmp/ctl.sock"),
            }),
            console_socket: None,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let container = sample("abcd", ContainerStatus::Created);
        store.save(&container).unwrap();

        let loaded = store.load("abcd", &AlwaysAlive).unwrap();
        assert_eq!(loaded.id, container.id);
        assert_eq!(loaded.status, container.status);
        assert_eq!(loaded.gofer_pid, container.gofer_pid);
        assert_eq!(
            loaded.sandbox.as_ref().map(|s| &s.id),
            container.sandbox.as_ref().map(|s| &s.id)
        );
    }

    #[test]
    fn abbreviated_prefix_resolution() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save(&sample("abcd", ContainerStatus::Created)).unwrap();
        store.save(&sample("abef", ContainerStatus::Created)).unwrap();

        assert!(matches!(
            store.load("ab", &AlwaysAlive),
            Err(ManagerError::Ambiguous(_, 2))
        ));
        assert_eq!(store.load("abc", &AlwaysAlive).unwrap().id, "abcd");
        assert!(matches!(
            store.load("zz", &AlwaysAlive),
            Err(ManagerError::NotFound(_))
        ));
    }

    #[test]
    fn liveness_reconciliation_does_not_rewrite_disk() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save(&sample("c1", ContainerStatus::Running)).unwrap();

        let loaded = store.load("c1", &NeverAlive).unwrap();
        assert_eq!(loaded.status, ContainerStatus::Stopped);
        assert!(loaded.sandbox.is_none());

        let raw = fs::read_to_string(dir.path().join("c1").join(META_FILE)).unwrap();
        assert!(raw.contains("\"Running\""));
    }

    #[test]
    fn destroy_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save(&sample("c1", ContainerStatus::Created)).unwrap();

        store.remove("c1").unwrap();
        assert!(!store.exists("c1"));
        store.remove("c1").unwrap();
    }
}
