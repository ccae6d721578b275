//! JSON snapshot files
//!
//! Snapshots are written with sorted keys (`serde_json::Map` is ordered by
//! key), 4-space indentation and raw UTF-8.

use crate::error::{HrdumpError, Result};
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix appended to a snapshot path by the post-processing step.
pub const PROCESSED_SUFFIX: &str = ".processed.json";

/// Serialize `value` as indented JSON.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Write `value` to `path`, replacing any existing file.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let bytes = to_pretty_json(value)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a JSON document from an existing file.
pub fn read_json(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(HrdumpError::InvalidInput(format!(
            "{} is not a file",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// File name of a snapshot taken at `micros` since the Unix epoch.
pub fn snapshot_file_name(name: &str, micros: i64) -> String {
    format!("{}_{}.json", name, micros)
}

/// Write `value` to `<dir>/<name>_<microsecond-timestamp>.json`.
///
/// The directory is created when missing. Returns the written path.
pub fn write_snapshot<T: Serialize>(value: &T, dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let micros = chrono::Utc::now().timestamp_micros();
    let path = dir.join(snapshot_file_name(name, micros));
    info!(path = %path.display(), "Dumping snapshot");
    write_json(&path, value)?;
    Ok(path)
}

/// Path of the processed copy of `path` (`<path>.processed.json`).
pub fn processed_path(path: impl AsRef<Path>) -> PathBuf {
    let mut os = path.as_ref().as_os_str().to_os_string();
    os.push(PROCESSED_SUFFIX);
    PathBuf::from(os)
}
