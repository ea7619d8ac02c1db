//! Implements the `features` command: reports the subset of the OCI runtime
//! spec this runtime recognizes.
use anyhow::Result;
use oci_cli_args::Features;
use serde::{Deserialize, Serialize};

pub const ANNOTATION_RUNTIME_VERSION: &str = "io.sandrun.runtime.version";

#[derive(Debug, Serialize, Deserialize)]
pub struct HardFeatures {
    oci_version_min: Option<String>,
    oci_version_max: Option<String>,
    hooks: Option<Vec<String>>,
    mount_options: Option<Vec<String>>,
    annotations: Option<std::collections::HashMap<String, String>>,
}

pub fn features(_: Features) -> Result<()> {
    let mut annotations = std::collections::HashMap::new();
    annotations.insert(
        ANNOTATION_RUNTIME_VERSION.to_string(),
        clap::crate_version!().to_string(),
    );

    let features = HardFeatures {
        oci_version_min: Some("1.0.0".to_string()),
        oci_version_max: Some("1.1.0".to_string()),
        hooks: Some(vec![
            "prestart".to_string(),
            "poststart".to_string(),
            "poststop".to_string(),
        ]),
        mount_options: Some(
            libsandrun::mount::KNOWN_OPTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
        annotations: Some(annotations),
    };

    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}
