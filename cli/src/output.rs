use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::PHASE_CREATE_FAILED;

/// Final record written for the caller to parse. Field order is fixed
/// by the struct, so serialization is byte-stable across runs.
#[derive(Debug, Serialize)]
pub struct OutputRecord {
    pub session_name: String,
    pub session_uid: String,
    pub session_phase: String,
    pub session_result: String,
}

impl OutputRecord {
    /// Record for a run whose creation request failed.
    pub fn create_failed() -> Self {
        Self {
            session_name: String::new(),
            session_uid: String::new(),
            session_phase: PHASE_CREATE_FAILED.to_string(),
            session_result: String::new(),
        }
    }
}

/// Write the record as indented JSON. A write failure is logged and
/// swallowed; it never fails the run.
pub fn write_output(path: Option<&Path>, record: &OutputRecord) {
    let Some(path) = path else {
        return;
    };

    let json = match serde_json::to_string_pretty(record) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize output record: {}", e);
            return;
        }
    };

    match std::fs::write(path, json) {
        Ok(()) => info!("Output written to {}", path.display()),
        Err(e) => warn!("Failed to write output file: {}", e),
    }
}
