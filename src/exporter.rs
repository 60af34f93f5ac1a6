use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{generate_id, Listing, ListingKind, ListingStatus, ListingValue};
use crate::utils::error::Result;

/// One listing in the export snapshot, with the tracked value expanded from
/// its stored JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: String,
    pub kind: ListingKind,
    pub title: String,
    pub category: String,
    pub url: String,
    pub value: ListingValue,
    pub status: ListingStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

pub struct Exporter {
    path: PathBuf,
}

impl Exporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write the full snapshot, replacing the previous export atomically:
    /// serialize to a temp file in the destination directory, then rename.
    /// A concurrent reader sees either the old export or the new one, never
    /// a truncated file.
    pub fn write_snapshot(&self, listings: &[Listing]) -> Result<usize> {
        let records: Vec<ExportRecord> = listings
            .iter()
            .filter_map(|listing| match listing.value() {
                Ok(value) => Some(ExportRecord {
                    id: listing.id.clone(),
                    kind: listing.kind,
                    title: listing.title.clone(),
                    category: listing.category.clone(),
                    url: listing.url.clone(),
                    value,
                    status: listing.status,
                    first_seen_at: listing.first_seen_at,
                    last_seen_at: listing.last_seen_at,
                }),
                Err(e) => {
                    warn!(id = %listing.id, error = %e, "skipping unreadable listing in export");
                    None
                }
            })
            .collect();

        let body = serde_json::to_vec_pretty(&records)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, &body)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(records.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        // Same directory as the destination so the rename stays on one
        // filesystem.
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "export.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, generate_id()))
    }
}
