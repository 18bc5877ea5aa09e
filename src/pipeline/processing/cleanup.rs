use crate::types::ArtifactRef;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<ArtifactRef>,
    /// Already gone before cleanup ran
    pub absent: Vec<ArtifactRef>,
    /// Could not be removed; left in place
    pub warnings: Vec<String>,
}

/// Remove intermediate file artifacts. Never fails: each problem becomes a warning.
pub fn remove_artifacts(artifacts: &[ArtifactRef]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for artifact in artifacts {
        if artifact.is_table() {
            let message = format!("refusing to remove table artifact {}", artifact);
            warn!("cleanup: {}", message);
            report.warnings.push(message);
            continue;
        }
        match fs::remove_file(artifact.as_path()) {
            Ok(()) => {
                debug!("cleanup: removed {}", artifact);
                report.removed.push(artifact.clone());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("cleanup: {} already absent", artifact);
                report.absent.push(artifact.clone());
            }
            Err(e) => {
                let message = format!("could not remove {}: {}", artifact, e);
                warn!("cleanup: {}", message);
                report.warnings.push(message);
            }
        }
    }
    info!(
        "cleanup: removed {}, absent {}, warnings {}",
        report.removed.len(),
        report.absent.len(),
        report.warnings.len()
    );
    report
}
