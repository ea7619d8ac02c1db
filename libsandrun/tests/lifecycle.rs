use std::collections::HashMap;
use std::sync::Arc;

use libsandrun::container::ContainerStatus;
use libsandrun::manager::Manager;
use libsandrun::sandbox::fake::{Call, FakeSandboxClient};
use libsandrun::RuntimeConfig;
use oci_spec::runtime::{HookBuilder, HooksBuilder, SpecBuilder};
use tempfile::tempdir;

fn config(root_dir: &std::path::Path) -> RuntimeConfig {
    let mut config = RuntimeConfig::new(root_dir, "/bin/true");
    config.direct_filesystem = true;
    config
}

fn minimal_spec() -> oci_spec::runtime::Spec {
    SpecBuilder::default().build().unwrap()
}

fn spec_with_annotations(annotations: HashMap<String, String>) -> oci_spec::runtime::Spec {
    SpecBuilder::default()
        .annotations(annotations)
        .build()
        .unwrap()
}

#[test]
fn happy_path_create_start_wait_destroy() {
    let dir = tempdir().unwrap();
    let sandbox = Arc::new(FakeSandboxClient::new());
    let manager = Manager::new(config(dir.path()), sandbox.clone());

    let mut annotations = HashMap::new();
    annotations.insert("io.sandrun/sandbox-create".to_string(), "true".to_string());

    let container = manager
        .create("c1", spec_with_annotations(annotations), dir.path().to_path_buf(), None, None)
        .unwrap();
    assert_eq!(container.status, ContainerStatus::Created);
    assert!(dir.path().join("c1").join("meta.json").exists());

    let container = manager.start("c1").unwrap();
    assert_eq!(container.status, ContainerStatus::Running);

    let status = manager.wait("c1").unwrap();
    assert!(status.exited);
    assert_eq!(status.exit_code, 0);

    manager.destroy("c1").unwrap();
    assert!(!dir.path().join("c1").exists());

    let calls = sandbox.calls();
    assert_eq!(calls.iter().filter(|c| **c == Call::Stop("c1".to_string())).count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == Call::Destroy).count(), 1);
}

#[test]
fn prestart_hook_failure_destroys_container() {
    let dir = tempdir().unwrap();
    let sandbox = Arc::new(FakeSandboxClient::new());
    let manager = Manager::new(config(dir.path()), sandbox.clone());

    let hook = HookBuilder::default().path("false").build().unwrap();
    let hooks = HooksBuilder::default().prestart(vec![hook]).build().unwrap();
    let mut annotations = HashMap::new();
    annotations.insert("io.sandrun/sandbox-create".to_string(), "true".to_string());
    let spec = SpecBuilder::default()
        .hooks(hooks)
        .annotations(annotations)
        .build()
        .unwrap();

    manager
        .create("c1", spec, dir.path().to_path_buf(), None, None)
        .unwrap();

    let err = manager.start("c1").unwrap_err();
    assert!(matches!(err, libsandrun::ManagerError::HookFailure { phase: "prestart", .. }));
    assert!(!dir.path().join("c1").exists());
    assert!(sandbox.calls().contains(&Call::Destroy));
}

#[test]
fn pause_resume_gating() {
    let dir = tempdir().unwrap();
    let sandbox = Arc::new(FakeSandboxClient::new());
    let manager = Manager::new(config(dir.path()), sandbox.clone());

    let mut annotations = HashMap::new();
    annotations.insert("io.sandrun/sandbox-create".to_string(), "true".to_string());
    manager
        .create("c1", spec_with_annotations(annotations), dir.path().to_path_buf(), None, None)
        .unwrap();

    assert!(manager.resume("c1").is_err());

    manager.start("c1").unwrap();
    let container = manager.pause("c1").unwrap();
    assert_eq!(container.status, ContainerStatus::Paused);

    manager.signal("c1", 15).unwrap();

    assert!(manager.pause("c1").is_err());

    let container = manager.resume("c1").unwrap();
    assert_eq!(container.status, ContainerStatus::Running);
}

#[test]
fn joining_container_shares_sandbox_and_is_destroyed_independently() {
    let dir = tempdir().unwrap();
    let sandbox = Arc::new(FakeSandboxClient::new());
    let manager = Manager::new(config(dir.path()), sandbox.clone());

    let mut root_annotations = HashMap::new();
    root_annotations.insert("io.sandrun/sandbox-create".to_string(), "true".to_string());
    let root = manager
        .create("c0", spec_with_annotations(root_annotations), dir.path().to_path_buf(), None, None)
        .unwrap();

    let mut join_annotations = HashMap::new();
    join_annotations.insert("io.sandrun/sandbox-id".to_string(), "c0".to_string());
    let joined = manager
        .create("c1", spec_with_annotations(join_annotations), dir.path().to_path_buf(), None, None)
        .unwrap();

    assert_eq!(
        joined.sandbox.as_ref().unwrap().id,
        root.sandbox.as_ref().unwrap().id
    );

    manager.destroy("c1").unwrap();
    assert_eq!(sandbox.calls().iter().filter(|c| **c == Call::Destroy).count(), 0);

    manager.destroy("c0").unwrap();
    assert_eq!(sandbox.calls().iter().filter(|c| **c == Call::Destroy).count(), 1);
}

#[test]
fn reattach_after_sandbox_crash_reports_stopped() {
    let dir = tempdir().unwrap();
    let sandbox = Arc::new(FakeSandboxClient::new());
    let manager = Manager::new(config(dir.path()), sandbox.clone());

    let mut annotations = HashMap::new();
    annotations.insert("io.sandrun/sandbox-create".to_string(), "true".to_string());
    manager
        .create("c1", spec_with_annotations(annotations), dir.path().to_path_buf(), None, None)
        .unwrap();
    manager.start("c1").unwrap();

    // FakeSandboxClient.create() hands back a PID (4242) that does not exist
    // on this host, simulating a crash observed by a fresh manager invocation.
    let reloaded = manager.load("c1").unwrap();
    assert_eq!(reloaded.status, ContainerStatus::Stopped);

    manager.destroy("c1").unwrap();
    assert!(!dir.path().join("c1").exists());
}
