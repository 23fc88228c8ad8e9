use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write a serializable object to a JSON file, replacing it wholesale.
///
/// The document is written to a sibling temp file first and renamed over the
/// target, so readers never observe a half-written file.
pub fn save_to_file<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp)
            .map_err(|e| anyhow!("Failed to create file {}: {}", tmp.display(), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)
            .map_err(|e| anyhow!("Failed to write {}: {}", tmp.display(), e))?;
        writer
            .flush()
            .map_err(|e| anyhow!("Failed to flush {}: {}", tmp.display(), e))?;
    }
    fs::rename(&tmp, path)
        .map_err(|e| anyhow!("Failed to replace {}: {}", path.display(), e))?;
    Ok(())
}

/// Load a deserializable object from a JSON file.
pub fn load_from_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);
    let data = serde_json::from_reader(reader)
        .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;
    Ok(data)
}
