use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::edited;
use crate::filename;
use crate::index::{CrossAlbumIndex, MetadataIndex};
use crate::media::MediaFile;
use crate::probe::EmbeddedTimestampProbe;
use crate::sidecar::MetadataRecord;

/// Name of the heuristic that classified a file, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTag {
    DirectJson,
    EditedInherit,
    CrossAlbumMatch,
    FilenameExtraction,
    ExifPreservation,
    AlbumDateInference,
    Unmapped,
}

impl StrategyTag {
    pub const ALL: [StrategyTag; 7] = [
        StrategyTag::DirectJson,
        StrategyTag::EditedInherit,
        StrategyTag::CrossAlbumMatch,
        StrategyTag::FilenameExtraction,
        StrategyTag::ExifPreservation,
        StrategyTag::AlbumDateInference,
        StrategyTag::Unmapped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyTag::DirectJson => "direct_json",
            StrategyTag::EditedInherit => "edited_inherit",
            StrategyTag::CrossAlbumMatch => "cross_album_match",
            StrategyTag::FilenameExtraction => "filename_extraction",
            StrategyTag::ExifPreservation => "exif_preservation",
            StrategyTag::AlbumDateInference => "album_date_inference",
            StrategyTag::Unmapped => "unmapped",
        }
    }

    /// Position in [`StrategyTag::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an album-level year came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumDateSource {
    AlbumName,
    AlbumMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InferredDate {
    pub year: i32,
    pub source: AlbumDateSource,
}

impl InferredDate {
    /// January 1st of the year, midnight.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, 1, 1)?.and_hms_opt(0, 0, 0)
    }
}

/// The chosen heuristic together with whatever it produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    DirectJson(Arc<MetadataRecord>),
    /// Record of the unedited original, `original` being its filename
    EditedInherit {
        original: String,
        record: Arc<MetadataRecord>,
    },
    /// Record found under another album
    CrossAlbumMatch {
        album: String,
        record: Arc<MetadataRecord>,
    },
    FilenameExtraction(NaiveDateTime),
    /// The file already carries a capture time and should be left alone
    ExifPreservation,
    AlbumDateInference(InferredDate),
    Unmapped,
}

impl Strategy {
    pub fn tag(&self) -> StrategyTag {
        match self {
            Strategy::DirectJson(_) => StrategyTag::DirectJson,
            Strategy::EditedInherit { .. } => StrategyTag::EditedInherit,
            Strategy::CrossAlbumMatch { .. } => StrategyTag::CrossAlbumMatch,
            Strategy::FilenameExtraction(_) => StrategyTag::FilenameExtraction,
            Strategy::ExifPreservation => StrategyTag::ExifPreservation,
            Strategy::AlbumDateInference(_) => StrategyTag::AlbumDateInference,
            Strategy::Unmapped => StrategyTag::Unmapped,
        }
    }
}

/// Classification of one media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub media: MediaFile,
    pub strategy: Strategy,
}

impl MatchResult {
    pub fn tag(&self) -> StrategyTag {
        self.strategy.tag()
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self.strategy, Strategy::Unmapped)
    }

    /// The sidecar record backing this result, if any.
    pub fn record(&self) -> Option<&MetadataRecord> {
        match &self.strategy {
            Strategy::DirectJson(record)
            | Strategy::EditedInherit { record, .. }
            | Strategy::CrossAlbumMatch { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Capture time to write, as local wall-clock time.
    pub fn resolved_datetime(&self) -> Option<NaiveDateTime> {
        match &self.strategy {
            Strategy::FilenameExtraction(dt) => Some(*dt),
            Strategy::AlbumDateInference(inferred) => inferred.datetime(),
            _ => self.record()?.taken_at(),
        }
    }

    /// Capture time to write, as UTC epoch seconds.
    pub fn timestamp(&self) -> Option<i64> {
        if let Some(record) = self.record() {
            return record.timestamp;
        }
        let local = self
            .resolved_datetime()?
            .and_local_timezone(chrono::Local)
            .earliest()?;
        Some(local.timestamp())
    }
}

/// Switches for the optional heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectOptions {
    pub filename_guess: bool,
    pub exif_probe: bool,
    pub album_inference: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            filename_guess: true,
            exif_probe: true,
            album_inference: true,
        }
    }
}

/// Pick the strategy for one media file. The first applicable strategy in
/// [`StrategyTag::ALL`] order wins; the result is never an error.
pub fn select(
    media: &MediaFile,
    album_index: &MetadataIndex,
    cross_index: &CrossAlbumIndex,
    probe: &dyn EmbeddedTimestampProbe,
    options: &SelectOptions,
) -> MatchResult {
    select_in(media, Some(album_index), cross_index, probe, options)
}

fn select_in(
    media: &MediaFile,
    album_index: Option<&MetadataIndex>,
    cross_index: &CrossAlbumIndex,
    probe: &dyn EmbeddedTimestampProbe,
    options: &SelectOptions,
) -> MatchResult {
    let strategy = choose(media, album_index, cross_index, probe, options);
    log::debug!("{} [{}] -> {}", media.filename, media.album, strategy.tag());
    MatchResult {
        media: media.clone(),
        strategy,
    }
}

fn choose(
    media: &MediaFile,
    album_index: Option<&MetadataIndex>,
    cross_index: &CrossAlbumIndex,
    probe: &dyn EmbeddedTimestampProbe,
    options: &SelectOptions,
) -> Strategy {
    let originals = edited::original_candidates(&media.filename);

    if let Some(index) = album_index {
        if let Some(record) = index.lookup(&media.filename) {
            return Strategy::DirectJson(Arc::clone(record));
        }

        for original in &originals {
            if let Some(record) = index.lookup(original) {
                return Strategy::EditedInherit {
                    original: original.clone(),
                    record: Arc::clone(record),
                };
            }
        }
    }

    let cross = std::iter::once(&media.filename)
        .chain(originals.iter())
        .find_map(|name| cross_index.lookup(name, &media.album));
    if let Some((album, record)) = cross {
        return Strategy::CrossAlbumMatch {
            album: album.to_string(),
            record: Arc::clone(record),
        };
    }

    if options.filename_guess {
        if let Some(dt) = filename::extract(&media.filename) {
            return Strategy::FilenameExtraction(dt);
        }
    }

    if options.exif_probe && probe.has_embedded_timestamp(&media.path) {
        return Strategy::ExifPreservation;
    }

    if options.album_inference {
        if let Some(inferred) = album_index.and_then(infer_album_date) {
            return Strategy::AlbumDateInference(inferred);
        }
    }

    Strategy::Unmapped
}

fn infer_album_date(index: &MetadataIndex) -> Option<InferredDate> {
    if let Some(year) = index.album().inferred_year() {
        return Some(InferredDate {
            year,
            source: AlbumDateSource::AlbumName,
        });
    }
    let year = index.album_metadata()?.year()?;
    Some(InferredDate {
        year,
        source: AlbumDateSource::AlbumMetadata,
    })
}

/// Owns the indices of one run and classifies media files against them.
pub struct StrategySelector {
    indices: Vec<MetadataIndex>,
    by_album: HashMap<String, usize>,
    cross: CrossAlbumIndex,
    probe: Box<dyn EmbeddedTimestampProbe>,
    options: SelectOptions,
}

impl StrategySelector {
    pub fn new(
        indices: Vec<MetadataIndex>,
        probe: Box<dyn EmbeddedTimestampProbe>,
        options: SelectOptions,
    ) -> Self {
        let cross = CrossAlbumIndex::build(&indices);
        let by_album = indices
            .iter()
            .enumerate()
            .map(|(i, index)| (index.album().id.clone(), i))
            .collect();
        Self {
            indices,
            by_album,
            cross,
            probe,
            options,
        }
    }

    /// Every album index, in discovery order.
    pub fn indices(&self) -> &[MetadataIndex] {
        &self.indices
    }

    pub fn album_index(&self, album_id: &str) -> Option<&MetadataIndex> {
        self.by_album.get(album_id).map(|&i| &self.indices[i])
    }

    pub fn classify(&self, media: &MediaFile) -> MatchResult {
        let index = self.album_index(&media.album);
        if index.is_none() {
            log::warn!("{} belongs to unindexed album {}", media.path.display(), media.album);
        }
        select_in(media, index, &self.cross, self.probe.as_ref(), &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Album, MediaKind};
    use crate::probe::NoProbe;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    struct AlwaysEmbedded;

    impl EmbeddedTimestampProbe for AlwaysEmbedded {
        fn has_embedded_timestamp(&self, _path: &Path) -> bool {
            true
        }
    }

    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempdir().unwrap(),
            }
        }

        fn album(&self, name: &str) -> &Self {
            fs::create_dir_all(self.root.path().join(name)).unwrap();
            self
        }

        fn file(&self, album: &str, name: &str, content: &str) -> &Self {
            let dir = self.root.path().join(album);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), content).unwrap();
            self
        }

        fn sidecar(&self, album: &str, name: &str, ts: i64) -> &Self {
            self.file(
                album,
                name,
                &format!(r#"{{"photoTakenTime":{{"timestamp":"{ts}"}}}}"#),
            )
        }

        fn index(&self, album: &str) -> MetadataIndex {
            MetadataIndex::build(Album::new(self.root.path().join(album), album.to_string()))
        }

        fn media(&self, album: &str, name: &str) -> MediaFile {
            MediaFile::new(
                self.root.path().join(album).join(name),
                album.to_string(),
                name.to_string(),
                MediaKind::detect(name).unwrap_or(MediaKind::Image),
            )
        }

        fn selector(&self, albums: &[&str], probe: Box<dyn EmbeddedTimestampProbe>) -> StrategySelector {
            let indices = albums.iter().map(|a| self.index(a)).collect();
            StrategySelector::new(indices, probe, SelectOptions::default())
        }
    }

    #[test]
    fn test_direct_beats_filename() {
        let fx = Fixture::new();
        fx.file("Test Album", "IMG_20210619_125530.jpg", "x")
            .sidecar("Test Album", "IMG_20210619_125530.jpg.supplemental-metadata.json", 1624113330);
        let sel = fx.selector(&["Test Album"], Box::new(AlwaysEmbedded));

        let result = sel.classify(&fx.media("Test Album", "IMG_20210619_125530.jpg"));
        assert_eq!(result.tag(), StrategyTag::DirectJson);
        assert_eq!(result.timestamp(), Some(1624113330));
    }

    #[test]
    fn test_edited_inherits_original() {
        let fx = Fixture::new();
        fx.file("Trip", "photo.jpg", "x")
            .file("Trip", "photo-edited.jpg", "x")
            .sidecar("Trip", "photo.jpg.json", 42);
        let sel = fx.selector(&["Trip"], Box::new(NoProbe));

        let result = sel.classify(&fx.media("Trip", "photo-edited.jpg"));
        match &result.strategy {
            Strategy::EditedInherit { original, record } => {
                assert_eq!(original, "photo.jpg");
                assert_eq!(record.timestamp, Some(42));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_edited_own_sidecar_is_direct() {
        let fx = Fixture::new();
        fx.sidecar("Trip", "photo.jpg.json", 1)
            .sidecar("Trip", "photo-edited.jpg.json", 2);
        let sel = fx.selector(&["Trip"], Box::new(NoProbe));

        let result = sel.classify(&fx.media("Trip", "photo-edited.jpg"));
        assert_eq!(result.tag(), StrategyTag::DirectJson);
        assert_eq!(result.timestamp(), Some(2));
    }

    #[test]
    fn test_cross_album_match() {
        let fx = Fixture::new();
        fx.album("Shared")
            .sidecar("Photos from 2019", "IMG_7.jpg.json", 7)
            .sidecar("Beach", "IMG_7.jpg.json", 8);
        let sel = fx.selector(&["Photos from 2019", "Shared", "Beach"], Box::new(NoProbe));

        let result = sel.classify(&fx.media("Shared", "IMG_7.jpg"));
        match &result.strategy {
            Strategy::CrossAlbumMatch { album, record } => {
                assert_eq!(album, "Beach");
                assert_eq!(record.timestamp, Some(8));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cross_album_edited() {
        let fx = Fixture::new();
        fx.album("Shared").sidecar("Photos from 2019", "IMG_7.jpg.json", 7);
        let sel = fx.selector(&["Photos from 2019", "Shared"], Box::new(NoProbe));

        let result = sel.classify(&fx.media("Shared", "IMG_7-edited.jpg"));
        assert_eq!(result.tag(), StrategyTag::CrossAlbumMatch);
        assert_eq!(result.timestamp(), Some(7));
    }

    #[test]
    fn test_filename_then_exif_then_album() {
        let fx = Fixture::new();
        fx.album("Photos from 2003");
        let index = fx.index("Photos from 2003");
        let cross = CrossAlbumIndex::build(&[]);
        let opts = SelectOptions::default();

        let r = select(&fx.media("Photos from 2003", "PANO_20180917_143000.jpg"), &index, &cross, &AlwaysEmbedded, &opts);
        assert_eq!(r.tag(), StrategyTag::FilenameExtraction);

        let r = select(&fx.media("Photos from 2003", "DVC00001.JPG"), &index, &cross, &AlwaysEmbedded, &opts);
        assert_eq!(r.tag(), StrategyTag::ExifPreservation);
        assert_eq!(r.resolved_datetime(), None);

        let r = select(&fx.media("Photos from 2003", "DVC00001.JPG"), &index, &cross, &NoProbe, &opts);
        assert_eq!(
            r.strategy,
            Strategy::AlbumDateInference(InferredDate {
                year: 2003,
                source: AlbumDateSource::AlbumName
            })
        );
        assert_eq!(
            r.resolved_datetime(),
            NaiveDate::from_ymd_opt(2003, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_album_metadata_year() {
        let fx = Fixture::new();
        fx.file("Untitled", "metadata.json", r#"{"date":{"timestamp":"1041379200"}}"#);
        let sel = fx.selector(&["Untitled"], Box::new(NoProbe));

        let result = sel.classify(&fx.media("Untitled", "scan.jpg"));
        assert_eq!(
            result.strategy,
            Strategy::AlbumDateInference(InferredDate {
                year: 2003,
                source: AlbumDateSource::AlbumMetadata
            })
        );
    }

    #[test]
    fn test_disabled_strategies_are_skipped() {
        let fx = Fixture::new();
        fx.album("2013 Xmas");
        let index = fx.index("2013 Xmas");
        let cross = CrossAlbumIndex::default();
        let opts = SelectOptions {
            filename_guess: false,
            exif_probe: false,
            album_inference: false,
        };
        let r = select(&fx.media("2013 Xmas", "IMG_20131224_200000.jpg"), &index, &cross, &AlwaysEmbedded, &opts);
        assert!(r.is_unmapped());
        assert!(r.record().is_none());
        assert_eq!(r.timestamp(), None);
    }

    #[test]
    fn test_never_fails() {
        let fx = Fixture::new();
        fx.album("Untitled");
        let sel = fx.selector(&["Untitled"], Box::new(ExifLike));
        for name in ["", ".", "..json", "(1)", "-edited", "???.jpg", "写真.heic"] {
            let result = sel.classify(&fx.media("Untitled", name));
            assert_eq!(result.tag(), StrategyTag::Unmapped, "{name:?}");
        }
        // album nobody indexed
        let result = sel.classify(&fx.media("Elsewhere", "x.jpg"));
        assert!(result.is_unmapped());
    }

    struct ExifLike;

    impl EmbeddedTimestampProbe for ExifLike {
        fn has_embedded_timestamp(&self, path: &Path) -> bool {
            crate::probe::ExifProbe.has_embedded_timestamp(path)
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let fx = Fixture::new();
        fx.file("Test Album", "IMG_20210619_125530.jpg", "jpeg")
            .sidecar("Test Album", "IMG_20210619_125530.jpg.supplemental-metadata.json", 1624113330)
            .file("Test Album", "IMG_20210619_125530-edited.jpg", "jpeg")
            .file("Untitled", "Burst_stack_0001.jpg", "jpeg");
        let sel = fx.selector(&["Test Album", "Untitled"], Box::new(crate::probe::ExifProbe));

        let direct = sel.classify(&fx.media("Test Album", "IMG_20210619_125530.jpg"));
        assert_eq!(direct.tag(), StrategyTag::DirectJson);
        assert_eq!(direct.timestamp(), Some(1624113330));

        let edited = sel.classify(&fx.media("Test Album", "IMG_20210619_125530-edited.jpg"));
        assert_eq!(edited.tag(), StrategyTag::EditedInherit);
        assert_eq!(edited.timestamp(), Some(1624113330));
        assert_eq!(edited.record(), direct.record());

        let burst = sel.classify(&fx.media("Untitled", "Burst_stack_0001.jpg"));
        assert_eq!(burst.tag(), StrategyTag::Unmapped);
    }

    #[test]
    fn test_tag_order() {
        for (i, tag) in StrategyTag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i);
        }
        assert_eq!(StrategyTag::CrossAlbumMatch.to_string(), "cross_album_match");
    }
}
