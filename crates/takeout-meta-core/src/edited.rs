use unicode_normalization::UnicodeNormalization;

/// Suffixes the vendor appends to derived copies of a photo (lowercase).
/// Compound forms come before the forms they end with.
const EDITED_SUFFIXES: &[&str] = &[
    "-effects-edited", // EN, edited effect
    "_1-edited",       // EN, edited duplicate
    "-edited",         // EN
    "_edited",         // EN (alternate)
    "-effects",        // EN
    "-smile",          // EN
    "-mix",            // EN
    "-edytowane",      // PL
    "-bearbeitet",     // DE
    "-bewerkt",        // NL
    "-編集済み",        // JA
    "-modificato",     // IT
    "-modifié",        // FR
    "-ha editado",     // ES
    "-editat",         // CA
];

/// Filenames of the originals an edited copy may have been derived from,
/// most specific first. Empty when the name carries no edited suffix.
///
/// `IMG_1_1-edited.jpg` yields `IMG_1.jpg` then `IMG_1_1.jpg`; a trailing
/// duplicate counter is kept: `photo-edited(1).jpg` yields `photo(1).jpg`.
pub fn original_candidates(filename: &str) -> Vec<String> {
    let normalized: String = filename.nfc().collect();
    let (stem, ext) = match normalized.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (normalized.as_str(), None),
    };
    let (core, counter) = split_counter(stem);
    let core_lower = core.to_lowercase();

    let mut candidates = Vec::new();
    for suffix in EDITED_SUFFIXES {
        if !core_lower.ends_with(suffix) {
            continue;
        }
        let Some(base) = strip_chars(core, suffix.chars().count()) else {
            continue;
        };
        if base.is_empty() {
            continue;
        }
        let candidate = match ext {
            Some(ext) => format!("{base}{counter}.{ext}"),
            None => format!("{base}{counter}"),
        };
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// `photo-edited(2)` -> (`photo-edited`, `(2)`)
fn split_counter(stem: &str) -> (&str, &str) {
    if let Some(open) = stem.strip_suffix(')').and_then(|s| s.rfind('(')) {
        let digits = &stem[open + 1..stem.len() - 1];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return (&stem[..open], &stem[open..]);
        }
    }
    (stem, "")
}

/// Drop the last `n` characters of `s`.
fn strip_chars(s: &str, n: usize) -> Option<&str> {
    if n == 0 {
        return Some(s);
    }
    let (idx, _) = s.char_indices().rev().nth(n - 1)?;
    Some(&s[..idx])
}
