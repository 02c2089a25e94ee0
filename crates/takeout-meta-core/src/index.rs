use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::media::Album;
use crate::sidecar::{self, AlbumMetadata, MetadataRecord, SidecarError, SidecarSuffix};

/// The vendor cuts sidecar filenames (including `.json`) at this length.
const MAX_SIDECAR_NAME_LEN: usize = 51;
const JSON_EXT: &str = ".json";

/// Stem, the last `(n)` counter before an extension, then the rest.
static COUNTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s)(.*)(\(\d+\))(\..*)$").unwrap());

/// Canonical form of a media filename used as index key.
pub fn normalize_key(filename: &str) -> String {
    filename.nfc().collect()
}

/// Keys a sidecar for `filename` may have been stored under, most exact first.
pub fn key_variants(filename: &str) -> Vec<String> {
    let exact = normalize_key(filename);
    let mut variants = vec![exact.clone()];
    let candidates = [
        shorten_name(&exact),
        bracket_swap(&exact),
        no_extension(&exact).to_string(),
    ];
    for candidate in candidates {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Prefix of `filename` the vendor keeps when it cuts `<filename>.json`
/// down to [`MAX_SIDECAR_NAME_LEN`] bytes.
fn shorten_name(filename: &str) -> String {
    let budget = MAX_SIDECAR_NAME_LEN.saturating_sub(JSON_EXT.len());
    let end = (0..=budget.min(filename.len()))
        .rev()
        .find(|&i| filename.is_char_boundary(i))
        .unwrap_or(0);
    filename[..end].to_string()
}

/// `image(1).jpg` -> `image.jpg(1)`, the form the vendor names sidecars by.
fn bracket_swap(filename: &str) -> String {
    COUNTER_RE.replace(filename, "${1}${3}${2}").into_owned()
}

fn no_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Non-fatal problems met while indexing one album.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexIssues {
    /// Sidecars whose JSON could not be parsed
    pub malformed: Vec<PathBuf>,
    /// Sidecars or directories that could not be read
    pub unreadable: Vec<PathBuf>,
    /// Sidecars discarded because a more specific suffix described the same file
    pub ambiguous: Vec<PathBuf>,
    /// Sidecars overwritten by another one with the same key and suffix
    pub collisions: Vec<PathBuf>,
}

/// Sidecar records of one album, keyed by normalized media filename.
#[derive(Debug)]
pub struct MetadataIndex {
    album: Album,
    entries: HashMap<String, Arc<MetadataRecord>>,
    album_metadata: Option<AlbumMetadata>,
    issues: IndexIssues,
}

impl MetadataIndex {
    /// Index every sidecar directly inside the album directory. Nested
    /// directories are albums of their own and are not visited.
    pub fn build(album: Album) -> Self {
        let mut index = Self {
            album,
            entries: HashMap::new(),
            album_metadata: None,
            issues: IndexIssues::default(),
        };

        let mut files: Vec<(String, PathBuf)> = match fs::read_dir(index.album.dir()) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .filter_map(|e| {
                    let name = e.file_name().to_str()?.to_string();
                    Some((name, e.path()))
                })
                .collect(),
            Err(e) => {
                log::warn!("Cannot read album {}: {e}", index.album.dir().display());
                index.issues.unreadable.push(index.album.dir().to_path_buf());
                return index;
            }
        };
        files.sort();

        // key -> candidate sidecars
        let mut candidates: HashMap<String, Vec<(SidecarSuffix, String, PathBuf)>> = HashMap::new();
        for (name, path) in files {
            if sidecar::is_album_metadata(&name) {
                index.load_album_metadata(&path);
                continue;
            }
            let Some(split) = sidecar::split_sidecar_name(&name) else {
                continue;
            };
            candidates
                .entry(normalize_key(&split.media_name))
                .or_default()
                .push((split.suffix, name, path));
        }

        for (key, mut group) in candidates {
            // Most specific suffix first; within one suffix the last name wins
            group.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));
            index.resolve_key(key, group);
        }

        log::debug!(
            "Indexed {} sidecar(s) in album {}",
            index.entries.len(),
            index.album.id
        );
        index
    }

    fn load_album_metadata(&mut self, path: &Path) {
        match AlbumMetadata::read(path) {
            Ok(meta) => self.album_metadata = Some(meta),
            Err(e) => self.record_error(e),
        }
    }

    fn resolve_key(&mut self, key: String, group: Vec<(SidecarSuffix, String, PathBuf)>) {
        let mut winner: Option<(SidecarSuffix, PathBuf)> = None;
        for (suffix, _name, path) in group {
            if let Some((won_suffix, won_path)) = &winner {
                if *won_suffix == suffix {
                    log::warn!(
                        "Sidecar {} collides with {} for key {key}; keeping the latter",
                        path.display(),
                        won_path.display()
                    );
                    self.issues.collisions.push(path);
                } else {
                    log::warn!(
                        "Ignoring sidecar {}: {} is more specific",
                        path.display(),
                        won_path.display()
                    );
                    self.issues.ambiguous.push(path);
                }
                continue;
            }
            match MetadataRecord::read(&path) {
                Ok(record) => {
                    self.entries.insert(key.clone(), Arc::new(record));
                    winner = Some((suffix, path));
                }
                Err(e) => self.record_error(e),
            }
        }
    }

    fn record_error(&mut self, err: SidecarError) {
        log::warn!("Skipping {err}");
        match err {
            SidecarError::Malformed { path, .. } => self.issues.malformed.push(path),
            SidecarError::Io { path, .. } => self.issues.unreadable.push(path),
        }
    }

    pub fn album(&self) -> &Album {
        &self.album
    }

    pub fn album_metadata(&self) -> Option<&AlbumMetadata> {
        self.album_metadata.as_ref()
    }

    pub fn issues(&self) -> &IndexIssues {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record stored under exactly `key`.
    pub fn get(&self, key: &str) -> Option<&Arc<MetadataRecord>> {
        self.entries.get(key)
    }

    /// Every record the album holds, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &Arc<MetadataRecord>> {
        self.entries.values()
    }

    /// Record for a media filename, trying each key variant in turn.
    pub fn lookup(&self, filename: &str) -> Option<&Arc<MetadataRecord>> {
        key_variants(filename).iter().find_map(|k| self.get(k))
    }
}

/// Sidecar records of every album, for files whose sidecar landed in a
/// different album than the file itself.
#[derive(Debug, Default)]
pub struct CrossAlbumIndex {
    /// key -> (album id, record), sorted by album id
    entries: HashMap<String, Vec<(String, Arc<MetadataRecord>)>>,
}

impl CrossAlbumIndex {
    pub fn build(indices: &[MetadataIndex]) -> Self {
        let mut entries: HashMap<String, Vec<(String, Arc<MetadataRecord>)>> = HashMap::new();
        for index in indices {
            for (key, record) in &index.entries {
                entries
                    .entry(key.clone())
                    .or_default()
                    .push((index.album.id.clone(), Arc::clone(record)));
            }
        }
        for albums in entries.values_mut() {
            albums.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First record for `filename` held by an album other than `exclude_album`,
    /// smallest album id first.
    pub fn lookup(&self, filename: &str, exclude_album: &str) -> Option<(&str, &Arc<MetadataRecord>)> {
        key_variants(filename).iter().find_map(|key| {
            self.entries
                .get(key)?
                .iter()
                .find(|(album, _)| album != exclude_album)
                .map(|(album, record)| (album.as_str(), record))
        })
    }
}
