pub mod album_date;
pub mod cancel;
pub mod edited;
pub mod filename;
pub mod index;
pub mod manifest;
pub mod media;
pub mod probe;
pub mod scan;
pub mod sidecar;
pub mod stats;
pub mod strategy;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use cancel::{CancellationToken, CancelledError};
pub use index::{CrossAlbumIndex, MetadataIndex};
pub use media::{Album, MediaFile, MediaKind};
pub use probe::{EmbeddedTimestampProbe, ExifProbe, NoProbe};
pub use sidecar::{MetadataRecord, SidecarError};
pub use stats::{Report, StatsAggregator};
pub use strategy::{select, MatchResult, SelectOptions, Strategy, StrategySelector, StrategyTag};

/// Settings of one classification run. Every field is optional in a config
/// file; missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Directory holding the unpacked export
    pub input: PathBuf,
    /// Skip timestamps guessed from filenames
    pub no_guess: bool,
    /// Skip reading EXIF from the media files
    pub no_exif: bool,
    /// Skip the album-name year fallback
    pub no_album_inference: bool,
    /// Write per-file results here as JSON
    pub manifest: Option<PathBuf>,
    /// Write the report here as JSON
    pub report: Option<PathBuf>,
}

impl ClassifyOptions {
    /// Read options from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn select_options(&self) -> SelectOptions {
        SelectOptions {
            filename_guess: !self.no_guess,
            exif_probe: !self.no_exif,
            album_inference: !self.no_album_inference,
        }
    }
}

/// Run-time control of a classification run.
#[derive(Debug, Clone, Default)]
pub struct ProcessControl {
    pub cancel_token: Option<CancellationToken>,
}

impl ProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// True once cancelled.
    fn should_stop(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(|token| token.check().is_err())
    }
}

/// Stage name, current, total, message.
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Forwards progress at most every 200ms, plus the final update of a stage.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Mutex<Option<Instant>>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(None),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        if current < total {
            let mut last = self.last_emit.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(*last, Some(t) if t.elapsed() < PROGRESS_INTERVAL) {
                return;
            }
            *last = Some(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct ClassifyOutcome {
    /// One result per media file, in discovery order. Partial when cancelled.
    pub results: Vec<MatchResult>,
    pub report: Report,
    pub cancelled: bool,
}

pub fn classify(options: &ClassifyOptions, progress: &ProgressCallback) -> anyhow::Result<ClassifyOutcome> {
    classify_with_control(options, &ProcessControl::default(), progress)
}

/// Scan the input, index every album, then classify every media file.
/// Cancellation stops scheduling new files; whatever finished is returned
/// with `cancelled` set.
pub fn classify_with_control(
    options: &ClassifyOptions,
    control: &ProcessControl,
    progress: &ProgressCallback,
) -> anyhow::Result<ClassifyOutcome> {
    let tp = ThrottledProgress::new(progress);
    let stats = Mutex::new(StatsAggregator::new());

    // Stage 1: discover albums and media
    let scan = scan::scan(&options.input)?;
    log::info!(
        "Found {} photo root(s): {}",
        scan.roots.len(),
        scan.roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    tp.report(
        "scan",
        1,
        1,
        &format!("{} media file(s), {} album(s)", scan.media.len(), scan.albums.len()),
    );
    if control.should_stop() {
        return finish(options, Vec::new(), stats, true);
    }

    // Stage 2: per-album sidecar indices
    let album_total = scan.albums.len() as u64;
    let done = AtomicU64::new(0);
    let indices: Vec<MetadataIndex> = scan
        .albums
        .into_par_iter()
        .map(|album| {
            let index = MetadataIndex::build(album);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            tp.report("index", current, album_total, &index.album().display_name);
            index
        })
        .collect();
    {
        let mut stats = stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.record_unreadable(&scan.unreadable);
        stats.record_live_photos(media::live_photo_pairs(&scan.media));
        indices.iter().for_each(|index| stats.record_index(index));
    }
    log::info!(
        "Indexed {} sidecar(s) across {} album(s)",
        indices.iter().map(MetadataIndex::len).sum::<usize>(),
        indices.len()
    );
    if control.should_stop() {
        return finish(options, Vec::new(), stats, true);
    }

    // Stage 3: classify
    let probe: Box<dyn EmbeddedTimestampProbe> = if options.no_exif {
        Box::new(NoProbe)
    } else {
        Box::new(ExifProbe)
    };
    let selector = StrategySelector::new(indices, probe, options.select_options());
    let media_total = scan.media.len() as u64;
    let done = AtomicU64::new(0);
    let results: Vec<MatchResult> = scan
        .media
        .par_iter()
        .filter_map(|media| {
            if control.should_stop() {
                return None;
            }
            let result = selector.classify(media);
            stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(&result);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            tp.report("classify", current, media_total, &media.filename);
            Some(result)
        })
        .collect();

    let cancelled = control
        .cancel_token
        .as_ref()
        .is_some_and(CancellationToken::is_cancelled);
    // Unused sidecars are only known once every file had its chance
    if !cancelled {
        let used: HashSet<&Path> = results
            .iter()
            .filter_map(MatchResult::record)
            .map(|record| record.source.as_path())
            .collect();
        let orphans = selector
            .indices()
            .iter()
            .flat_map(MetadataIndex::records)
            .map(|record| record.source.as_path())
            .filter(|source| !used.contains(source));
        stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_orphans(orphans);
    }
    finish(options, results, stats, cancelled)
}

fn finish(
    options: &ClassifyOptions,
    results: Vec<MatchResult>,
    stats: Mutex<StatsAggregator>,
    cancelled: bool,
) -> anyhow::Result<ClassifyOutcome> {
    let mut report = stats
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .finalize();
    report.cancelled = cancelled;

    if cancelled {
        log::warn!("Cancelled after classifying {} media file(s)", results.len());
    } else {
        log::info!(
            "Classified {} media file(s), {} left for review",
            report.total,
            report.count(StrategyTag::Unmapped)
        );
    }

    if let Some(path) = &options.manifest {
        manifest::write_manifest(&results, path)?;
        log::info!("Manifest written to {}", path.display());
    }
    if let Some(path) = &options.report {
        manifest::write_report(&report, path)?;
        log::info!("Report written to {}", path.display());
    }

    Ok(ClassifyOutcome {
        results,
        report,
        cancelled,
    })
}
