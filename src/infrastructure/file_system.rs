use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::domain::product::ProductRecord;

/// Opens `path` for line reading, transparently decompressing `.gz` files.
fn open_lines(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Reads a JSON Lines file (optionally gzip-compressed) into `T`s.
///
/// Blank lines are skipped; a line that does not parse fails the whole read.
pub fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for (line_no, line) in open_lines(path)?.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| {
            anyhow!("Failed to parse line {} of {}: {}", line_no + 1, path.display(), e)
        })?;
        items.push(item);
    }
    debug!("Loaded {} lines from {}", items.len(), path.display());
    Ok(items)
}

/// Reads a whole JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

/// Loads product records from a JSONL file, dropping records that fail validation.
pub fn load_product_records(path: &Path) -> Result<Vec<ProductRecord>> {
    let records: Vec<ProductRecord> = load_jsonl(path)?;
    let total = records.len();
    let valid: Vec<ProductRecord> = records
        .into_iter()
        .filter(|record| match record.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping record '{}' from {}: {}", record.title, path.display(), e);
                false
            }
        })
        .collect();
    if valid.len() < total {
        warn!(
            "Skipped {} of {} records in {}",
            total - valid.len(),
            total,
            path.display()
        );
    }
    Ok(valid)
}

/// Downloads `url` to `dest` unless `dest` already exists.
///
/// The body is written to a sibling temporary file first so an interrupted
/// download never leaves a truncated file at `dest`. Blocking; run it on the
/// blocking pool from async code.
pub fn download_if_not_exists(url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        debug!("{} already exists, skipping download", dest.display());
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    info!("Downloading {} to {}", url, dest.display());
    let mut resp = reqwest::blocking::get(url).with_context(|| format!("Failed to GET {}", url))?;
    if !resp.status().is_success() {
        return Err(anyhow!("Download of {} failed with status {}", url, resp.status()));
    }

    let tmp = dest.with_extension("part");
    let result = (|| -> Result<u64> {
        let mut out = File::create(&tmp)?;
        let written = resp.copy_to(&mut out)?;
        out.sync_all()?;
        fs::rename(&tmp, dest)?;
        Ok(written)
    })();
    match result {
        Ok(written) => {
            info!("Downloaded {} bytes to {}", written, dest.display());
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e.context(format!("Failed to write {}", dest.display())))
        }
    }
}
