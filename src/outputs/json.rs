//! JSON batch persistence, one file per (year, month).
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── articles_2024_02.json
//! ├── articles_2024_01.json
//! └── articles_2023_12.json
//! ```
//!
//! Each file is a pretty-printed JSON array of article records with
//! non-ASCII text written as-is. Writing a bucket replaces the whole file;
//! records are never merged with an earlier run's batch.

use crate::error::PersistError;
use crate::models::ArticleRecord;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

const BATCH_PREFIX: &str = "articles_";
const BATCH_EXTENSION: &str = "json";

/// Writes and reads bucket batches under one output directory.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    output_dir: PathBuf,
}

impl BatchWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/articles_<YYYY>_<MM>.json`
    pub fn batch_path(&self, year: i32, month: u32) -> PathBuf {
        self.output_dir
            .join(format!("{BATCH_PREFIX}{year}_{month:02}.{BATCH_EXTENSION}"))
    }

    /// Write one bucket's records, replacing any earlier batch for the same month.
    ///
    /// The batch is written to a temporary sibling first and renamed into
    /// place, so readers see either the old batch or the new one in full.
    ///
    /// # Arguments
    ///
    /// * `records` - The bucket's records, in extraction order
    /// * `year` / `month` - The bucket the records belong to
    ///
    /// # Returns
    ///
    /// The path of the written batch, or a [`PersistError`] if the directory
    /// cannot be created, the records cannot be encoded or the file cannot be
    /// written.
    #[instrument(level = "info", skip(self, records), fields(count = records.len()))]
    pub async fn persist(
        &self,
        records: &[ArticleRecord],
        year: i32,
        month: u32,
    ) -> Result<PathBuf, PersistError> {
        let path = self.batch_path(year, month);
        let json = encode_pretty(records).map_err(|source| PersistError::Json {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_err(&self.output_dir))?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).await.map_err(io_err(&staging))?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(io_err(&path)(e));
        }

        info!(path = %path.display(), "Wrote article batch");
        Ok(path)
    }

    /// Every persisted batch under the output directory, oldest month first.
    #[instrument(level = "info", skip(self), fields(dir = %self.output_dir.display()))]
    pub async fn load_all(&self) -> Result<Vec<(PathBuf, Vec<ArticleRecord>)>, PersistError> {
        let mut entries = fs::read_dir(&self.output_dir)
            .await
            .map_err(io_err(&self.output_dir))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_err(&self.output_dir))?
        {
            let path = entry.path();
            if is_batch_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut batches = Vec::with_capacity(paths.len());
        for path in paths {
            match read_batch(&path).await {
                Ok(records) => batches.push((path, records)),
                Err(e) => warn!(error = %e, "Skipping unreadable batch"),
            }
        }
        debug!(count = batches.len(), "Loaded batches");
        Ok(batches)
    }
}

/// Read one persisted batch.
///
/// `keywords` stored as a single comma-separated string is split into a list.
pub async fn read_batch(path: &Path) -> Result<Vec<ArticleRecord>, PersistError> {
    let raw = fs::read(path).await.map_err(io_err(path))?;
    serde_json::from_slice(&raw).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PersistError {
    let path = path.to_path_buf();
    move |source| PersistError::Io { path, source }
}

fn is_batch_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with(BATCH_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(BATCH_EXTENSION)
}

/// Four-space indented JSON.
fn encode_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}
