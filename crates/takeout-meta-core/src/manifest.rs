use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::media::MediaKind;
use crate::stats::Report;
use crate::strategy::{MatchResult, Strategy, StrategyTag};

/// One media file as handed to the metadata writer.
#[derive(Debug, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub filename: String,
    pub kind: MediaKind,
    pub strategy: StrategyTag,
    /// UTC epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Local wall-clock time, `YYYY-MM-DDTHH:MM:SS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<String>,
    /// Edited copies: the original whose sidecar was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// Cross-album matches: album the sidecar came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_album: Option<String>,
    /// Left for a human to look at
    pub review: bool,
}

impl From<&MatchResult> for ManifestEntry {
    fn from(result: &MatchResult) -> Self {
        let record = result.record();
        let (original, source_album) = match &result.strategy {
            Strategy::EditedInherit { original, .. } => (Some(original.clone()), None),
            Strategy::CrossAlbumMatch { album, .. } => (None, Some(album.clone())),
            _ => (None, None),
        };
        Self {
            path: to_slash(&result.media.path),
            filename: result.media.filename.clone(),
            kind: result.media.kind,
            strategy: result.tag(),
            timestamp: result.timestamp(),
            datetime: result
                .resolved_datetime()
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            latitude: record.and_then(|r| r.latitude),
            longitude: record.and_then(|r| r.longitude),
            altitude: record.and_then(|r| r.altitude),
            title: record.and_then(|r| r.title.clone()),
            description: record.and_then(|r| r.description.clone()),
            tags: record.map(|r| r.tags.clone()).unwrap_or_default(),
            sidecar: record.map(|r| to_slash(&r.source)),
            original,
            source_album,
            review: result.is_unmapped(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub total: usize,
    pub review: usize,
    /// album id -> entries, in discovery order
    pub albums: BTreeMap<String, Vec<ManifestEntry>>,
}

impl Manifest {
    pub fn build(results: &[MatchResult]) -> Self {
        let mut albums: BTreeMap<String, Vec<ManifestEntry>> = BTreeMap::new();
        for result in results {
            albums
                .entry(result.media.album.clone())
                .or_default()
                .push(ManifestEntry::from(result));
        }
        Self {
            total: results.len(),
            review: results.iter().filter(|r| r.is_unmapped()).count(),
            albums,
        }
    }
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Write the per-file results as a JSON manifest.
pub fn write_manifest(results: &[MatchResult], path: &Path) -> anyhow::Result<()> {
    write_json(&Manifest::build(results), path)
}

pub fn write_report(report: &Report, path: &Path) -> anyhow::Result<()> {
    write_json(report, path)
}
