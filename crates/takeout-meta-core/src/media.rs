use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;

use crate::album_date;

/// Image or video, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a filename by its guessed MIME type. Returns `None` for
    /// anything that is not a photo or a video (sidecars, html, etc.).
    pub fn detect(filename: &str) -> Option<Self> {
        // mime_guess has no entry for AVCHD streams
        if filename.to_lowercase().ends_with(".mts") {
            return Some(MediaKind::Video);
        }
        let mime = mime_guess::from_path(filename).first()?;
        if mime.type_() == mime_guess::mime::IMAGE {
            Some(MediaKind::Image)
        } else if mime.type_() == mime_guess::mime::VIDEO {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Identifier of the containing album (see [`Album::id`])
    pub album: String,
    /// Just the filename
    pub filename: String,
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn new(path: PathBuf, album: String, filename: String, kind: MediaKind) -> Self {
        Self {
            path,
            album,
            filename,
            kind,
        }
    }
}

/// One export directory grouping media files and their sidecars.
#[derive(Debug)]
pub struct Album {
    /// Directory on disk
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated. Unique per run.
    pub id: String,
    /// Directory name, verbatim
    pub display_name: String,
    inferred_year: OnceLock<Option<i32>>,
}

impl Album {
    pub fn new(path: PathBuf, id: String) -> Self {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        Self {
            path,
            id,
            display_name,
            inferred_year: OnceLock::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.path
    }

    /// Year guessed from the album name, computed on first use.
    pub fn inferred_year(&self) -> Option<i32> {
        *self
            .inferred_year
            .get_or_init(|| album_date::infer(&self.display_name))
    }
}

/// Count HEIC stills that have a motion companion in the same album, either
/// `<stem>(1).heic` or `<stem>.mov`. Names compare without case.
pub fn live_photo_pairs(media: &[MediaFile]) -> usize {
    let names: HashSet<(&str, String)> = media
        .iter()
        .map(|m| (m.album.as_str(), m.filename.to_lowercase()))
        .collect();
    names
        .iter()
        .filter(|(album, name)| {
            name.strip_suffix(".heic").is_some_and(|stem| {
                names.contains(&(*album, format!("{stem}(1).heic")))
                    || names.contains(&(*album, format!("{stem}.mov")))
            })
        })
        .count()
}
