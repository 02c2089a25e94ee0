use chrono::Datelike;
use regex::Regex;
use std::sync::LazyLock;

/// Earliest year a photograph can plausibly carry.
const FIRST_PHOTO_YEAR: i32 = 1826;

/// Localized prefixes: "<prefix>YYYY"
const YEAR_FOLDER_PREFIXES: &[&str] = &[
    "Photos from ",      // EN
    "Fotos von ",        // DE
    "Fotos aus ",        // DE (alternate)
    "Photos de ",        // FR
    "Fotos de ",         // ES, PT, CA
    "Foto's uit ",       // NL
    "Foto dal ",         // IT
    "Foto del ",         // IT (alternate)
    "Zdjęcia z ",        // PL
    "Фото за ",          // RU
    "Фотографии за ",    // RU (alternate)
    "Fotky z ",          // CS
    "Fotografii din ",   // RO
    "Foton från ",       // SV
    "Bilder fra ",       // NO
    "Billeder fra ",     // DA
    "Valokuvat ",        // FI
    "Fényképek - ",      // HU
    "Fotoğraflar ",      // TR
];

/// Localized suffixes: "YYYY<suffix>"
const YEAR_FOLDER_SUFFIXES: &[&str] = &[
    " 年の写真",   // JA
    "年のフォト",   // JA (alternate)
    "년의 사진",    // KO
    "年的照片",     // ZH-CN
    "年的相片",     // ZH-TW
];

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
static LEADING_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<year>\d{4})(?:\s+\S.*)?$").unwrap());

/// Guess a year from an album name.
///
/// Recognizes the vendor year folders ("Photos from 2003" and its localized
/// forms) and user albums whose first token is a year ("2013 Xmas").
/// Years outside 1826..=next year are rejected.
pub fn infer(album_name: &str) -> Option<i32> {
    let name = album_name.trim();

    for prefix in YEAR_FOLDER_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            if YEAR_RE.is_match(rest) {
                return rest.parse().ok().and_then(plausible_year);
            }
        }
    }
    for suffix in YEAR_FOLDER_SUFFIXES {
        if let Some(rest) = name.strip_suffix(suffix) {
            if YEAR_RE.is_match(rest) {
                return rest.parse().ok().and_then(plausible_year);
            }
        }
    }

    let caps = LEADING_YEAR_RE.captures(name)?;
    caps.name("year")?.as_str().parse().ok().and_then(plausible_year)
}

/// Accept a year only if it is a plausible capture year.
pub fn plausible_year(year: i32) -> Option<i32> {
    let latest = chrono::Local::now().year() + 1;
    (FIRST_PHOTO_YEAR..=latest).contains(&year).then_some(year)
}
