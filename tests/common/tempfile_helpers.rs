//! Helpers for writing platform descriptions to disk

use anyhow::Context;
use std::io::Write;

/// Write `contents` to a fresh named temp file
pub fn write_temp_json(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .context("Failed to create temporary platform file")?;
    file.write_all(contents.as_bytes())
        .context("Failed to write temporary platform file")?;
    file.flush().context("Failed to flush temporary platform file")?;
    Ok(file)
}

pub fn create_temp_dir() -> anyhow::Result<tempfile::TempDir> {
    tempfile::tempdir().context("Failed to create temporary directory for test")
}
