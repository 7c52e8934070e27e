//! JSON snapshot files: the hand-off between fetch steps and the write step.
//!
//! Each resource is stored as one pretty-printed JSON array in
//! `<dir>/<resource>.json`. Files are written in one go with no temp-file swap;
//! a crash mid-write shows up later as a parse error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};

use crate::contract::Resource;
use crate::error::SnapshotError;

pub fn snapshot_path(dir: &Path, resource: Resource) -> PathBuf {
    dir.join(resource.snapshot_file())
}

/// Write `records` as the snapshot for `resource`, creating `dir` if needed.
pub fn write_snapshot<T: Serialize>(
    dir: &Path,
    resource: Resource,
    records: &[T],
) -> Result<PathBuf, SnapshotError> {
    let path = snapshot_path(dir, resource);
    fs::create_dir_all(dir).map_err(|source| {
        error!(error = ?source, dir = %dir.display(), "[SNAPSHOT] Failed to create snapshot directory");
        SnapshotError::Io {
            path: dir.to_path_buf(),
            source,
        }
    })?;
    let json = serde_json::to_string_pretty(records).map_err(|source| SnapshotError::Encode {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| {
        error!(error = ?source, path = %path.display(), "[SNAPSHOT] Failed to write snapshot");
        SnapshotError::Io {
            path: path.clone(),
            source,
        }
    })?;
    info!(%resource, records = records.len(), path = %path.display(), "[SNAPSHOT] Saved");
    Ok(path)
}

/// Read the snapshot for `resource`.
///
/// A missing file is reported with the step that produces it.
pub fn read_snapshot<T: DeserializeOwned>(
    dir: &Path,
    resource: Resource,
) -> Result<Vec<T>, SnapshotError> {
    let path = snapshot_path(dir, resource);
    if !path.exists() {
        error!(path = %path.display(), step = resource.producing_step(), "[SNAPSHOT] Missing snapshot");
        return Err(SnapshotError::Missing {
            path,
            step: resource.producing_step(),
        });
    }
    let content = fs::read_to_string(&path).map_err(|source| SnapshotError::Io {
        path: path.clone(),
        source,
    })?;
    let records: Vec<T> = serde_json::from_str(&content).map_err(|source| {
        error!(error = %source, path = %path.display(), "[SNAPSHOT] Snapshot is corrupt");
        SnapshotError::Parse {
            path: path.clone(),
            source,
        }
    })?;
    info!(%resource, records = records.len(), path = %path.display(), "[SNAPSHOT] Loaded");
    Ok(records)
}
