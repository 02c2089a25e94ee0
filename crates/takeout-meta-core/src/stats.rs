use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::filename;
use crate::index::{IndexIssues, MetadataIndex};
use crate::strategy::{MatchResult, StrategyTag};

/// Non-fatal conditions met during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub malformed_sidecars: u64,
    pub unreadable_files: u64,
    pub ambiguous_sidecars: u64,
    pub key_collisions: u64,
    pub unrecognized_filenames: u64,
    /// Sidecars no media file ended up using
    pub orphaned_sidecars: u64,
    pub album_metadata_files: u64,
    pub live_photo_pairs: u64,
}

/// The files behind the non-fatal counts, for a human to look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProblemFiles {
    #[serde(flatten)]
    pub index: IndexIssues,
    pub orphaned: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyCount {
    pub strategy: StrategyTag,
    pub count: u64,
    pub percentage: f64,
}

/// Final per-strategy breakdown of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total: u64,
    pub strategies: Vec<StrategyCount>,
    pub issues: IssueCounts,
    pub problems: ProblemFiles,
    pub cancelled: bool,
}

impl Report {
    pub fn count(&self, tag: StrategyTag) -> u64 {
        self.strategies[tag.index()].count
    }

    pub fn percentage(&self, tag: StrategyTag) -> f64 {
        self.strategies[tag.index()].percentage
    }

    /// Files that ended up with any strategy but `unmapped`.
    pub fn resolved(&self) -> u64 {
        self.total - self.count(StrategyTag::Unmapped)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Media files: {} ({} resolved)", self.total, self.resolved())?;
        for s in &self.strategies {
            writeln!(f, "  {:<22}{:>8}  {:>6.2}%", s.strategy.as_str(), s.count, s.percentage)?;
        }
        writeln!(f, "Non-fatal conditions:")?;
        let issues = [
            ("malformed sidecars", self.issues.malformed_sidecars),
            ("unreadable files", self.issues.unreadable_files),
            ("ambiguous sidecars", self.issues.ambiguous_sidecars),
            ("key collisions", self.issues.key_collisions),
            ("unrecognized filenames", self.issues.unrecognized_filenames),
            ("orphaned sidecars", self.issues.orphaned_sidecars),
        ];
        for (label, count) in issues {
            writeln!(f, "  {label:<22}{count:>8}")?;
        }
        writeln!(f, "Album metadata files: {}", self.issues.album_metadata_files)?;
        writeln!(f, "Live photo pairs: {}", self.issues.live_photo_pairs)?;
        if self.cancelled {
            writeln!(f, "Run was cancelled; counts are partial.")?;
        }
        Ok(())
    }
}

/// Accumulates match results into per-strategy counters. Recording the same
/// media path twice has no effect.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    seen: HashSet<PathBuf>,
    counts: [u64; StrategyTag::ALL.len()],
    issues: IssueCounts,
    problems: ProblemFiles,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &MatchResult) {
        if !self.seen.insert(result.media.path.clone()) {
            return;
        }
        let tag = result.tag();
        self.counts[tag.index()] += 1;

        // Files that got past the filename step had a name it could not read
        if tag > StrategyTag::FilenameExtraction && filename::extract(&result.media.filename).is_none() {
            self.issues.unrecognized_filenames += 1;
        }
    }

    /// Fold in the conditions met while indexing an album.
    pub fn record_index(&mut self, index: &MetadataIndex) {
        let issues = index.issues();
        self.issues.malformed_sidecars += issues.malformed.len() as u64;
        self.issues.unreadable_files += issues.unreadable.len() as u64;
        self.issues.ambiguous_sidecars += issues.ambiguous.len() as u64;
        self.issues.key_collisions += issues.collisions.len() as u64;
        if index.album_metadata().is_some() {
            self.issues.album_metadata_files += 1;
        }

        let problems = &mut self.problems.index;
        problems.malformed.extend_from_slice(&issues.malformed);
        problems.unreadable.extend_from_slice(&issues.unreadable);
        problems.ambiguous.extend_from_slice(&issues.ambiguous);
        problems.collisions.extend_from_slice(&issues.collisions);
    }

    /// Directory entries the scan could not read.
    pub fn record_unreadable(&mut self, paths: &[PathBuf]) {
        self.issues.unreadable_files += paths.len() as u64;
        self.problems.index.unreadable.extend_from_slice(paths);
    }

    /// Sidecars left unused once every media file was classified.
    pub fn record_orphans<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) {
        for path in paths {
            self.issues.orphaned_sidecars += 1;
            self.problems.orphaned.push(path.to_path_buf());
        }
    }

    pub fn record_live_photos(&mut self, pairs: usize) {
        self.issues.live_photo_pairs += pairs as u64;
    }

    pub fn recorded(&self) -> u64 {
        self.seen.len() as u64
    }

    pub fn finalize(&self) -> Report {
        let total = self.recorded();
        let strategies = StrategyTag::ALL
            .iter()
            .map(|&tag| {
                let count = self.counts[tag.index()];
                let percentage = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                StrategyCount {
                    strategy: tag,
                    count,
                    percentage,
                }
            })
            .collect();
        let mut problems = self.problems.clone();
        for paths in [
            &mut problems.index.malformed,
            &mut problems.index.unreadable,
            &mut problems.index.ambiguous,
            &mut problems.index.collisions,
            &mut problems.orphaned,
        ] {
            paths.sort();
        }
        Report {
            total,
            strategies,
            issues: self.issues,
            problems,
            cancelled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Album, MediaFile, MediaKind};
    use crate::strategy::Strategy;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn result(name: &str, strategy: Strategy) -> MatchResult {
        MatchResult {
            media: MediaFile::new(
                PathBuf::from("/takeout/Album").join(name),
                "Album".to_string(),
                name.to_string(),
                MediaKind::Image,
            ),
            strategy,
        }
    }

    fn guessed() -> Strategy {
        Strategy::FilenameExtraction(
            NaiveDate::from_ymd_opt(2021, 6, 19)
                .unwrap()
                .and_hms_opt(12, 55, 30)
                .unwrap(),
        )
    }

    #[test]
    fn test_empty_batch() {
        let report = StatsAggregator::new().finalize();
        assert_eq!(report.total, 0);
        assert_eq!(report.strategies.len(), StrategyTag::ALL.len());
        assert!(report.strategies.iter().all(|s| s.count == 0 && s.percentage == 0.0));
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let mut stats = StatsAggregator::new();
        stats.record(&result("IMG_20210619_125530.jpg", guessed()));
        stats.record(&result("a.jpg", Strategy::ExifPreservation));
        stats.record(&result("b.jpg", Strategy::Unmapped));
        let report = stats.finalize();

        let sum: f64 = report.strategies.iter().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 0.01);
        assert_eq!(report.total, 3);
        assert_eq!(report.resolved(), 2);
        assert!((report.percentage(StrategyTag::Unmapped) - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut stats = StatsAggregator::new();
        let r = result("b.jpg", Strategy::Unmapped);
        stats.record(&r);
        stats.record(&r);
        let report = stats.finalize();
        assert_eq!(report.total, 1);
        assert_eq!(report.count(StrategyTag::Unmapped), 1);
        assert_eq!(report.issues.unrecognized_filenames, 1);
    }

    #[test]
    fn test_index_issues_are_counted() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Trip");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("a.jpg.json"), "{ nope").unwrap();
        fs::write(album.join("b.jpg.supplemental-metadata.json"), "{}").unwrap();
        fs::write(album.join("b.jpg.json"), "{}").unwrap();

        let index = MetadataIndex::build(Album::new(album.clone(), "Trip".to_string()));
        let mut stats = StatsAggregator::new();
        stats.record_index(&index);
        let report = stats.finalize();
        assert_eq!(report.issues.malformed_sidecars, 1);
        assert_eq!(report.issues.ambiguous_sidecars, 1);
        assert_eq!(report.issues.album_metadata_files, 0);
        assert_eq!(report.problems.index.malformed, vec![album.join("a.jpg.json")]);
        assert_eq!(report.problems.index.ambiguous, vec![album.join("b.jpg.json")]);
    }

    #[test]
    fn test_coverage_counts() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Trip");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("metadata.json"), r#"{"title":"Trip"}"#).unwrap();

        let index = MetadataIndex::build(Album::new(album.clone(), "Trip".to_string()));
        let mut stats = StatsAggregator::new();
        stats.record_index(&index);
        stats.record_unreadable(&[album.join("locked")]);
        stats.record_orphans([album.join("z.jpg.json").as_path(), album.join("y.jpg.json").as_path()]);
        stats.record_live_photos(3);
        let report = stats.finalize();

        assert_eq!(report.issues.album_metadata_files, 1);
        assert_eq!(report.issues.orphaned_sidecars, 2);
        assert_eq!(report.issues.live_photo_pairs, 3);
        assert_eq!(report.issues.unreadable_files, 1);
        assert_eq!(
            report.problems.orphaned,
            vec![album.join("y.jpg.json"), album.join("z.jpg.json")]
        );

        let text = report.to_string();
        assert!(text.contains("orphaned sidecars"));
        assert!(text.contains("Album metadata files: 1"));
        assert!(text.contains("Live photo pairs: 3"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["issues"]["orphaned_sidecars"], 2);
        assert_eq!(json["problems"]["unreadable"][0], album.join("locked").to_str().unwrap());
        assert_eq!(json["problems"]["orphaned"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_report_rendering() {
        let mut stats = StatsAggregator::new();
        stats.record(&result("b.jpg", Strategy::Unmapped));
        let mut report = stats.finalize();
        report.cancelled = true;

        let text = report.to_string();
        assert!(text.contains("Media files: 1 (0 resolved)"));
        assert!(text.contains("unmapped"));
        assert!(text.contains("100.00%"));
        assert!(text.contains("cancelled"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["strategies"][6]["strategy"], "unmapped");
        assert_eq!(json["cancelled"], true);
    }
}
