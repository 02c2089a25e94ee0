use chrono::{NaiveDate, NaiveDateTime};
use exif::{DateTime, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::media::MediaKind;

/// Files larger than this are not opened for EXIF.
const MAX_EXIF_PROBE_SIZE: u64 = 32 * 1024 * 1024;

/// Answers whether a media file already carries its own capture time.
pub trait EmbeddedTimestampProbe: Send + Sync {
    fn has_embedded_timestamp(&self, path: &Path) -> bool;
}

/// Reads EXIF date tags from image files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifProbe;

impl EmbeddedTimestampProbe for ExifProbe {
    fn has_embedded_timestamp(&self, path: &Path) -> bool {
        let is_image = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(MediaKind::detect)
            == Some(MediaKind::Image);
        if !is_image {
            return false;
        }
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() <= MAX_EXIF_PROBE_SIZE => {}
            _ => return false,
        }
        read_exif_date(path).is_some()
    }
}

/// Never reports an embedded timestamp; used when probing is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl EmbeddedTimestampProbe for NoProbe {
    fn has_embedded_timestamp(&self, _path: &Path) -> bool {
        false
    }
}

/// Capture time from the EXIF block of an image, local time as written.
pub fn read_exif_date(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .find_map(|field| match &field.value {
            Value::Ascii(parts) => parts.first().and_then(|raw| parse_exif_datetime(raw)),
            _ => None,
        })
}

/// `YYYY:MM:DD HH:MM:SS`; some writers use `-`, `/` or `.` between date parts.
fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let mut raw = raw.to_vec();
    for i in [4, 7] {
        if matches!(raw.get(i), Some(b'-' | b'/' | b'.')) {
            raw[i] = b':';
        }
    }
    // Unset camera clocks write zeros, which no calendar date accepts
    let dt = DateTime::from_ascii(&raw).ok()?;
    NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?.and_hms_opt(
        dt.hour.into(),
        dt.minute.into(),
        dt.second.into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_exif_datetime() {
        let expected = NaiveDate::from_ymd_opt(2003, 7, 4)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap();
        assert_eq!(parse_exif_datetime(b"2003:07:04 10:20:30"), Some(expected));
        assert_eq!(parse_exif_datetime(b"2003-07-04 10:20:30"), Some(expected));
        assert_eq!(parse_exif_datetime(b"2003:07:04"), None);
        assert_eq!(parse_exif_datetime(b"2003:02:30 10:20:30"), None);
        assert_eq!(parse_exif_datetime(b"0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime(b"garbage"), None);
    }

    #[test]
    fn test_probe_without_exif() {
        let dir = tempdir().unwrap();
        let jpg = dir.path().join("photo.jpg");
        fs::write(&jpg, b"not really a jpeg").unwrap();
        let mp4 = dir.path().join("clip.mp4");
        fs::write(&mp4, b"not really a video").unwrap();

        assert!(!ExifProbe.has_embedded_timestamp(&jpg));
        assert!(!ExifProbe.has_embedded_timestamp(&mp4));
        assert!(!ExifProbe.has_embedded_timestamp(&dir.path().join("missing.jpg")));
        assert!(!NoProbe.has_embedded_timestamp(&jpg));
    }
}
