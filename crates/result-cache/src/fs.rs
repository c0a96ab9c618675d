//! Durable-tier file helpers.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Write-temp-then-rename so concurrent readers never observe a
/// partially written entry.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// All entry files in the durable tier.
pub fn entry_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Remove a file and report its size, ignoring absence.
pub fn remove_reporting_size(path: &Path) -> u64 {
    let size = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    let _ = fs::remove_file(path);
    size
}
