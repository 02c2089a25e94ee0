use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::album_date;

/// Sidecar naming conventions, most specific first. The derived ordering
/// is the resolution priority when one media file has several sidecars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SidecarSuffix {
    /// `.supplemental-metadata.json`
    SupplementalMetadata,
    /// `.supplemental-metada.json`, a vendor misspelling
    SupplementalMetadaTypo,
    /// `.s.json`
    Short,
    /// `.supplemental-meta.json` and other cut-off forms of the full suffix
    Truncated,
    /// `.json`
    Plain,
}

const FIXED_SUFFIXES: &[(&str, SidecarSuffix)] = &[
    (".supplemental-metadata.json", SidecarSuffix::SupplementalMetadata),
    (".supplemental-metada.json", SidecarSuffix::SupplementalMetadaTypo),
    (".s.json", SidecarSuffix::Short),
];

const FULL_SUPPLEMENTAL: &str = "supplemental-metadata";

/// Album-level metadata files, lowercase. Localized exports rename them.
const ALBUM_METADATA_NAMES: &[&str] = &[
    "metadata.json",
    "metadaten.json",
    "métadonnées.json",
    "metadatos.json",
    "metadati.json",
    "metagegevens.json",
];

// IMG_0001.jpg.supplemental-metadata(1).json belongs to IMG_0001(1).jpg
static DUPLICATE_COUNTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<body>.+?)(?P<dup>\(\d+\))\.(?i:json)$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("cannot read sidecar {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed sidecar {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// What a sidecar filename says about the media file it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarName {
    /// Media filename the sidecar belongs to (not yet normalized)
    pub media_name: String,
    pub suffix: SidecarSuffix,
}

/// True for the per-album `metadata.json`, which describes the album
/// rather than any single media file.
pub fn is_album_metadata(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    ALBUM_METADATA_NAMES.contains(&lower.as_str())
}

/// Split a sidecar filename into the media filename and the suffix that
/// was stripped. Returns `None` for anything that is not a `.json` file.
pub fn split_sidecar_name(filename: &str) -> Option<SidecarName> {
    if let Some(caps) = DUPLICATE_COUNTER_RE.captures(filename) {
        let body = caps.name("body")?.as_str();
        let dup = caps.name("dup")?.as_str();
        let inner = split_plain(&format!("{body}.json"))?;
        return Some(SidecarName {
            media_name: format!("{}{}", inner.media_name, dup),
            suffix: inner.suffix,
        });
    }
    split_plain(filename)
}

fn split_plain(filename: &str) -> Option<SidecarName> {
    for (suffix, kind) in FIXED_SUFFIXES {
        if let Some(media) = strip_suffix_ignore_case(filename, suffix) {
            return Some(SidecarName {
                media_name: media.to_string(),
                suffix: *kind,
            });
        }
    }

    let stem = strip_suffix_ignore_case(filename, ".json")?;
    if stem.is_empty() {
        return None;
    }

    // The cut can land anywhere in the suffix, right after its dot included,
    // which leaves `<media>..json`. A one-letter `s` was taken as Short above.
    if let Some((media, tail)) = stem.rsplit_once('.') {
        let tail = tail.to_ascii_lowercase();
        if !media.is_empty() && FULL_SUPPLEMENTAL.starts_with(&tail) {
            return Some(SidecarName {
                media_name: media.to_string(),
                suffix: SidecarSuffix::Truncated,
            });
        }
    }

    Some(SidecarName {
        media_name: stem.to_string(),
        suffix: SidecarSuffix::Plain,
    })
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSidecar {
    title: Option<String>,
    description: Option<String>,
    photo_taken_time: Option<RawTime>,
    geo_data: Option<RawGeo>,
    geo_data_exif: Option<RawGeo>,
    people: Vec<RawPerson>,
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTime {
    timestamp: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGeo {
    latitude: f64,
    longitude: f64,
    altitude: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPerson {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAlbumMetadata {
    title: Option<String>,
    description: Option<String>,
    date: Option<RawTime>,
}

/// Timestamps appear both as strings and as numbers.
fn parse_epoch(time: Option<&RawTime>) -> Option<i64> {
    match time?.timestamp.as_ref()? {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parsed content of one per-file sidecar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    /// photoTakenTime, UTC epoch seconds
    pub timestamp: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub source: PathBuf,
}

impl MetadataRecord {
    pub fn read(path: &Path) -> Result<Self, SidecarError> {
        let bytes = std::fs::read(path).map_err(|source| SidecarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes, path)
    }

    pub fn parse(json_bytes: &[u8], source: &Path) -> Result<Self, SidecarError> {
        let raw: RawSidecar =
            serde_json::from_slice(json_bytes).map_err(|e| SidecarError::Malformed {
                path: source.to_path_buf(),
                source: e,
            })?;

        // 0,0 is how the vendor writes "no location"; geoDataExif is the
        // camera's own fix and fills in when geoData is empty
        let geo = [raw.geo_data.as_ref(), raw.geo_data_exif.as_ref()]
            .into_iter()
            .flatten()
            .find(|g| g.latitude != 0.0 || g.longitude != 0.0);

        let mut tags = raw.tags;
        for person in raw.people {
            let name = person.name.trim();
            if !name.is_empty() && !tags.iter().any(|t| t == name) {
                tags.push(name.to_string());
            }
        }

        Ok(Self {
            timestamp: parse_epoch(raw.photo_taken_time.as_ref()),
            latitude: geo.map(|g| g.latitude),
            longitude: geo.map(|g| g.longitude),
            altitude: geo.map(|g| g.altitude).filter(|a| *a != 0.0),
            title: non_empty(raw.title),
            description: non_empty(raw.description),
            tags,
            source: source.to_path_buf(),
        })
    }

    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Capture time as local wall-clock time.
    pub fn taken_at(&self) -> Option<NaiveDateTime> {
        let utc = chrono::DateTime::from_timestamp(self.timestamp?, 0)?;
        Some(utc.with_timezone(&chrono::Local).naive_local())
    }
}

/// The album-level `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Album date, UTC epoch seconds
    pub timestamp: Option<i64>,
    pub source: PathBuf,
}

impl AlbumMetadata {
    pub fn read(path: &Path) -> Result<Self, SidecarError> {
        let bytes = std::fs::read(path).map_err(|source| SidecarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawAlbumMetadata =
            serde_json::from_slice(&bytes).map_err(|e| SidecarError::Malformed {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            title: non_empty(raw.title),
            description: non_empty(raw.description),
            timestamp: parse_epoch(raw.date.as_ref()),
            source: path.to_path_buf(),
        })
    }

    /// Year of the album date, if it is a plausible capture year.
    pub fn year(&self) -> Option<i32> {
        let utc = chrono::DateTime::from_timestamp(self.timestamp?, 0)?;
        album_date::plausible_year(utc.year())
    }
}
