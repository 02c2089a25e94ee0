use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

/// A vendor naming convention and how to read its captures.
struct NamePattern {
    regex: &'static LazyLock<Regex>,
    /// Date-only names have no time fields and resolve to noon.
    has_time: bool,
}

// IMG_20210619_125530, PANO_..., VID_..., MVIMG_... or bare 20210619_125530,
// optionally followed by a qualifier such as -EFFECTS or .PANO
static RE_COMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:IMG|PANO|VID|MVIMG)_)?(?P<y>\d{4})(?P<mo>\d{2})(?P<d>\d{2})_(?P<h>\d{2})(?P<mi>\d{2})(?P<s>\d{2})(?:\D|$)",
    )
    .unwrap()
});
// 2021-06-19 12-55-30
static RE_HUMAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<y>\d{4})-(?P<mo>\d{2})-(?P<d>\d{2}) (?P<h>\d{2})-(?P<mi>\d{2})-(?P<s>\d{2})(?:\D|$)",
    )
    .unwrap()
});
// 2021-06-19.jpg
static RE_DATE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<y>\d{4})-(?P<mo>\d{2})-(?P<d>\d{2})\.[A-Za-z0-9]+$").unwrap()
});

static PATTERNS: &[NamePattern] = &[
    NamePattern { regex: &RE_COMPACT, has_time: true },
    NamePattern { regex: &RE_HUMAN, has_time: true },
    NamePattern { regex: &RE_DATE_ONLY, has_time: false },
];

/// Extract a capture timestamp from a media filename.
///
/// Returns `None` for names outside the known conventions and for
/// calendrically impossible values (month 13, February 30, hour 24...).
pub fn extract(filename: &str) -> Option<NaiveDateTime> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    PATTERNS.iter().find_map(|pat| {
        let caps = pat.regex.captures(basename)?;
        build_datetime(&caps, pat.has_time)
    })
}

fn build_datetime(caps: &Captures, has_time: bool) -> Option<NaiveDateTime> {
    let field = |name: &str| -> Option<u32> { caps.name(name)?.as_str().parse().ok() };

    let year: i32 = caps.name("y")?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field("mo")?, field("d")?)?;
    if has_time {
        date.and_hms_opt(field("h")?, field("mi")?, field("s")?)
    } else {
        date.and_hms_opt(12, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_vendor_patterns() {
        assert_eq!(extract("IMG_20210619_125530.jpg"), Some(dt(2021, 6, 19, 12, 55, 30)));
        assert_eq!(extract("PANO_20180917_143000.jpg"), Some(dt(2018, 9, 17, 14, 30, 0)));
        assert_eq!(extract("VID_20210619_125530.mp4"), Some(dt(2021, 6, 19, 12, 55, 30)));
        assert_eq!(extract("MVIMG_20190509_154733.jpg"), Some(dt(2019, 5, 9, 15, 47, 33)));
        assert_eq!(extract("20210619_125530.jpg"), Some(dt(2021, 6, 19, 12, 55, 30)));
        assert_eq!(extract("2021-06-19 12-55-30.jpeg"), Some(dt(2021, 6, 19, 12, 55, 30)));
        assert_eq!(extract("2021-06-19.jpg"), Some(dt(2021, 6, 19, 12, 0, 0)));
    }

    #[test]
    fn test_qualifiers_and_case() {
        assert_eq!(extract("IMG_20210619_125530-EFFECTS.jpg"), Some(dt(2021, 6, 19, 12, 55, 30)));
        assert_eq!(extract("PANO_20180917_143000.PANO.jpg"), Some(dt(2018, 9, 17, 14, 30, 0)));
        assert_eq!(extract("IMG_20180804_134812_1-edited.jpg"), Some(dt(2018, 8, 4, 13, 48, 12)));
        assert_eq!(extract("img_20210619_125530.JPG"), Some(dt(2021, 6, 19, 12, 55, 30)));
        assert_eq!(extract("/some/album/IMG_20210619_125530.jpg"), Some(dt(2021, 6, 19, 12, 55, 30)));
    }

    #[test]
    fn test_invalid_calendar_values() {
        assert_eq!(extract("IMG_20211319_125530.jpg"), None);
        assert_eq!(extract("IMG_20210632_125530.jpg"), None);
        assert_eq!(extract("IMG_20210230_125530.jpg"), None);
        assert_eq!(extract("IMG_20210619_245530.jpg"), None);
        assert_eq!(extract("IMG_20210619_126030.jpg"), None);
        assert_eq!(extract("2021-00-19 12-55-30.jpg"), None);
    }

    #[test]
    fn test_unrecognized_names() {
        for name in [
            "Burst_stack_0001.jpg",
            "Picture 001.jpg",
            "IMG_001.jpg",
            "photo.jpg",
            "DVC00001.JPG",
            "screenshot.png",
            "untitled.jpeg",
            "1234567890123.jpg",
            "IMG_20210619_1255301.jpg",
        ] {
            assert_eq!(extract(name), None, "{name}");
        }
    }
}
