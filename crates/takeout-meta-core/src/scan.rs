use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use walkdir::{DirEntry, WalkDir};

use crate::media::{Album, MediaFile, MediaKind};

/// What was found below the input directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Library roots the albums were collected from
    pub roots: Vec<PathBuf>,
    /// Every directory holding at least one file, in walk order
    pub albums: Vec<Album>,
    /// Photos and videos, in walk order
    pub media: Vec<MediaFile>,
    /// Entries the walk could not read
    pub unreadable: Vec<PathBuf>,
}

/// Whether a directory name is the export's photo library folder.
/// Covers the localized names ("Google Photos", "Google Fotos", "Google フォト", ...).
pub fn is_library_dir(name: &str) -> bool {
    name.starts_with("Google")
        && (name.contains("hoto")
            || name.contains("oto")
            || name.contains("ото")
            || name.contains("フォト")
            || name.contains("照片")
            || name.contains("사진"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

/// Library folders below `input`, outermost only. Falls back to `input` itself.
fn find_roots(input: &Path) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let walker = WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));
    for entry in walker.flatten() {
        if !entry.file_type().is_dir() || roots.iter().any(|r| entry.path().starts_with(r)) {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_library_dir) {
            roots.push(entry.into_path());
        }
    }
    if roots.is_empty() {
        roots.push(input.to_path_buf());
    }
    roots
}

fn album_id(input: &Path, dir: &Path) -> String {
    let rel = dir.strip_prefix(input).unwrap_or(dir);
    let id = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if id.is_empty() {
        ".".to_string()
    } else {
        id
    }
}

/// Discover albums and media files below `input`.
pub fn scan(input: &Path) -> anyhow::Result<ScanResult> {
    let meta = std::fs::metadata(input)
        .with_context(|| format!("Cannot read input {}", input.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Input {} is not a directory", input.display());
    }

    let mut result = ScanResult {
        roots: find_roots(input),
        ..Default::default()
    };
    let mut album_slots: HashMap<PathBuf, usize> = HashMap::new();

    for root in result.roots.clone() {
        log::debug!("Scanning {}", root.display());
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {e}");
                    if let Some(path) = e.path() {
                        result.unreadable.push(path.to_path_buf());
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            if !album_slots.contains_key(dir) {
                album_slots.insert(dir.to_path_buf(), result.albums.len());
                result
                    .albums
                    .push(Album::new(dir.to_path_buf(), album_id(input, dir)));
            }

            let Some(filename) = entry.file_name().to_str() else {
                log::warn!("Skipping non UTF-8 filename {}", entry.path().display());
                continue;
            };
            let Some(kind) = MediaKind::detect(filename) else {
                continue;
            };
            let album = &result.albums[album_slots[dir]];
            result.media.push(MediaFile::new(
                entry.path().to_path_buf(),
                album.id.clone(),
                filename.to_string(),
                kind,
            ));
        }
    }

    log::info!(
        "Found {} media file(s) in {} album(s)",
        result.media.len(),
        result.albums.len()
    );
    Ok(result)
}
