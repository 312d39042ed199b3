//! Place-name canonicalisation.
//!
//! Boards mix Tamil script, colonial-era spellings and OCR-mangled English.
//! Everything is folded onto one upper-case English name per place so the
//! downstream duplicate detection can compare records directly.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical English names. Each maps to itself.
const CANONICAL_NAMES: &[&str] = &[
    "ARUPPUKKOTTAI",
    "BENGALURU",
    "CHENNAI",
    "COIMBATORE",
    "DINDIGUL",
    "ERODE",
    "HOSUR",
    "KANYAKUMARI",
    "KARUR",
    "KOCHI",
    "KOZHIKODE",
    "KUMBAKONAM",
    "MADURAI",
    "MYSURU",
    "NAGERCOIL",
    "NAMAKKAL",
    "PALAKKAD",
    "PATTUKKOTTAI",
    "PUDUCHERRY",
    "RAMANATHAPURAM",
    "RAMESWARAM",
    "SALEM",
    "SIVAKASI",
    "THANJAVUR",
    "THENI",
    "THIRUVANANTHAPURAM",
    "THOOTHUKUDI",
    "TIRUNELVELI",
    "TIRUPATI",
    "TIRUPPUR",
    "TRICHY",
    "VELLORE",
    "VIRUDHUNAGAR",
];

/// Alternate and historical spellings.
const SPELLING_VARIANTS: &[(&str, &str)] = &[
    ("ARUPPUKOTTAI", "ARUPPUKKOTTAI"),
    ("BANGALORE", "BENGALURU"),
    ("BANGALURU", "BENGALURU"),
    ("CALICUT", "KOZHIKODE"),
    ("CAPE COMORIN", "KANYAKUMARI"),
    ("COCHIN", "KOCHI"),
    ("DINDUGAL", "DINDIGUL"),
    ("KOVAI", "COIMBATORE"),
    ("MADRAS", "CHENNAI"),
    ("MYSORE", "MYSURU"),
    ("NELLAI", "TIRUNELVELI"),
    ("PATTUKOTTAI", "PATTUKKOTTAI"),
    ("PONDICHERRY", "PUDUCHERRY"),
    ("PONDY", "PUDUCHERRY"),
    ("RAMESHWARAM", "RAMESWARAM"),
    ("RAMNAD", "RAMANATHAPURAM"),
    ("TANJORE", "THANJAVUR"),
    ("THANJAI", "THANJAVUR"),
    ("TIRUCHIRAPALLI", "TRICHY"),
    ("TIRUCHIRAPPALLI", "TRICHY"),
    ("TIRUPATHI", "TIRUPATI"),
    ("TIRUPUR", "TIRUPPUR"),
    ("TRICHI", "TRICHY"),
    ("TRIVANDRUM", "THIRUVANANTHAPURAM"),
    ("TUTICORIN", "THOOTHUKUDI"),
    ("VIRUDUNAGAR", "VIRUDHUNAGAR"),
];

/// Word prefixes that survive common OCR misreads of long names.
const STEM_RULES: &[(&str, &str)] = &[
    ("RAMESWAR", "RAMESWARAM"),
    ("RAMESHWAR", "RAMESWARAM"),
    ("TIRUCHIRAP", "TRICHY"),
    ("PATTUKOT", "PATTUKKOTTAI"),
    ("PATTUKKOT", "PATTUKKOTTAI"),
];

/// Tamil script names. Matched as substrings since Tamil words take suffixes.
const TAMIL_NAMES: &[(&str, &str)] = &[
    ("சென்னை", "CHENNAI"),
    ("மதுரை", "MADURAI"),
    ("கோயம்புத்தூர்", "COIMBATORE"),
    ("கோவை", "COIMBATORE"),
    ("திருச்சிராப்பள்ளி", "TRICHY"),
    ("திருச்சி", "TRICHY"),
    ("சேலம்", "SALEM"),
    ("திருநெல்வேலி", "TIRUNELVELI"),
    ("நெல்லை", "TIRUNELVELI"),
    ("கன்னியாகுமரி", "KANYAKUMARI"),
    ("தஞ்சாவூர்", "THANJAVUR"),
    ("ஈரோடு", "ERODE"),
    ("வேலூர்", "VELLORE"),
    ("திருப்பூர்", "TIRUPPUR"),
    ("கரூர்", "KARUR"),
    ("கும்பகோணம்", "KUMBAKONAM"),
    ("தூத்துக்குடி", "THOOTHUKUDI"),
    ("பட்டுக்கோட்டை", "PATTUKKOTTAI"),
    ("ராமேஸ்வரம்", "RAMESWARAM"),
    ("இராமேஸ்வரம்", "RAMESWARAM"),
    ("சிவகாசி", "SIVAKASI"),
    ("விருதுநகர்", "VIRUDHUNAGAR"),
    ("அருப்புக்கோட்டை", "ARUPPUKKOTTAI"),
    ("இராமநாதபுரம்", "RAMANATHAPURAM"),
    ("ராமநாதபுரம்", "RAMANATHAPURAM"),
    ("திண்டுக்கல்", "DINDIGUL"),
    ("தேனி", "THENI"),
    ("நாகர்கோவில்", "NAGERCOIL"),
    ("நாமக்கல்", "NAMAKKAL"),
    ("ஓசூர்", "HOSUR"),
    ("பெங்களூரு", "BENGALURU"),
    ("பெங்களூர்", "BENGALURU"),
    ("மைசூர்", "MYSURU"),
    ("திருப்பதி", "TIRUPATI"),
    ("புதுச்சேரி", "PUDUCHERRY"),
    ("திருவனந்தபுரம்", "THIRUVANANTHAPURAM"),
    ("கொச்சி", "KOCHI"),
    ("பாலக்காடு", "PALAKKAD"),
];

/// Facility suffixes that follow a place name on signage.
const FACILITY_SUFFIXES: &[&str] = &[
    " BUS STAND",
    " BUS STATION",
    " BUS DEPOT",
    " BUS STOP",
    " STAND",
    " DEPOT",
];

static PARENTHESISED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());

static TRAILING_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\d]+$").unwrap());

static TAMIL_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\x{0B80}-\x{0BFF}]").unwrap());

/// Normalises place names onto canonical English spellings.
///
/// Stateless; the lookup tables are compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationNormalizer;

impl LocationNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Canonical name for `text`, or `None` when there is nothing to normalise.
    ///
    /// English spellings are tried before Tamil script. When a line names
    /// more than one known place (a "CHENNAI TRICHY" route pair, say) it is
    /// passed through rather than collapsed onto one of them. Unrecognised
    /// input comes back upper-cased with whitespace collapsed.
    pub fn normalize(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return None;
        }

        let cleaned = strip_decorations(trimmed);

        if let Some(canonical) = exact_english(&cleaned) {
            return Some(canonical.to_string());
        }

        if let Some(canonical) = unique(english_matches(&cleaned)) {
            return Some(canonical.to_string());
        }

        if TAMIL_CHAR.is_match(trimmed) {
            if let Some(canonical) = unique(tamil_matches(trimmed)) {
                return Some(canonical.to_string());
            }
        }

        Some(collapse_whitespace(&trimmed.to_uppercase()))
    }

    /// First known place mentioned in a line, by position.
    ///
    /// Used for spotting the origin in a board header, where the line is
    /// usually the station name surrounded by other words.
    pub fn find_known(&self, line: &str) -> Option<&'static str> {
        self.find_english(line).or_else(|| self.find_tamil(line))
    }

    /// First known English-spelled place in a line.
    pub fn find_english(&self, line: &str) -> Option<&'static str> {
        english_matches(line)
            .into_iter()
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, name)| name)
    }

    /// First known Tamil-script place in a line.
    pub fn find_tamil(&self, line: &str) -> Option<&'static str> {
        tamil_matches(line)
            .into_iter()
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, name)| name)
    }

    /// Whether `name` is already a canonical name.
    pub fn is_canonical(&self, name: &str) -> bool {
        CANONICAL_NAMES.iter().any(|c| *c == name)
    }
}

/// Upper-case, drop parenthesised asides, facility suffixes and trailing numbers.
fn strip_decorations(text: &str) -> String {
    let upper = text.to_uppercase();
    let without_parens = PARENTHESISED.replace_all(&upper, " ");
    let mut name = collapse_whitespace(&without_parens);

    for suffix in FACILITY_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
            break;
        }
    }

    TRAILING_DIGITS.replace(&name, "").trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn exact_english(name: &str) -> Option<&'static str> {
    if let Some(canonical) = CANONICAL_NAMES.iter().find(|c| **c == name).copied() {
        return Some(canonical);
    }
    SPELLING_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == name)
        .map(|(_, canonical)| *canonical)
}

/// Every known English name or stem occurring in the text, with its byte position.
///
/// OCR often runs words together, so names are matched as substrings. A
/// match lying inside a longer one ("TRICHI" inside "TIRUCHIRAPALLI", say)
/// is dropped in favour of the longer spelling.
fn english_matches(text: &str) -> Vec<(usize, &'static str)> {
    let upper = text.to_uppercase();
    let spellings = CANONICAL_NAMES
        .iter()
        .map(|c| (*c, *c))
        .chain(SPELLING_VARIANTS.iter().copied())
        .chain(STEM_RULES.iter().copied());

    let mut spans: Vec<(usize, usize, &'static str)> = Vec::new();
    for (spelling, canonical) in spellings {
        for (pos, matched) in upper.match_indices(spelling) {
            spans.push((pos, pos + matched.len(), canonical));
        }
    }

    spans
        .iter()
        .filter(|(start, end, _)| {
            !spans.iter().any(|(other_start, other_end, _)| {
                other_start <= start && end <= other_end && other_end - other_start > end - start
            })
        })
        .map(|(start, _, canonical)| (*start, *canonical))
        .collect()
}

fn tamil_matches(text: &str) -> Vec<(usize, &'static str)> {
    TAMIL_NAMES
        .iter()
        .filter_map(|(tamil, canonical)| text.find(tamil).map(|pos| (pos, *canonical)))
        .collect()
}

/// The single canonical name among matches, if they all agree.
fn unique(matches: Vec<(usize, &'static str)>) -> Option<&'static str> {
    let mut names = matches.into_iter().map(|(_, name)| name);
    let first = names.next()?;
    names.all(|name| name == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_are_fixed_points() {
        let normalizer = LocationNormalizer::new();
        for name in CANONICAL_NAMES {
            assert_eq!(normalizer.normalize(name).as_deref(), Some(*name));
            let again = normalizer.normalize(name).unwrap();
            assert_eq!(normalizer.normalize(&again).as_deref(), Some(*name));
        }
    }

    #[test]
    fn test_spelling_variants() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("Bangalore").as_deref(), Some("BENGALURU"));
        assert_eq!(normalizer.normalize("MADRAS").as_deref(), Some("CHENNAI"));
        assert_eq!(normalizer.normalize("kovai").as_deref(), Some("COIMBATORE"));
        assert_eq!(normalizer.normalize("Tuticorin").as_deref(), Some("THOOTHUKUDI"));
        assert_eq!(normalizer.normalize("Cape Comorin").as_deref(), Some("KANYAKUMARI"));
        assert_eq!(normalizer.normalize("RAMESHWARAM").as_deref(), Some("RAMESWARAM"));
    }

    #[test]
    fn test_stems_catch_misreads() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("RAMESWARM").as_deref(), Some("RAMESWARAM"));
        assert_eq!(normalizer.normalize("TIRUCHIRAPALI").as_deref(), Some("TRICHY"));
        assert_eq!(normalizer.normalize("PATTUKOTAI").as_deref(), Some("PATTUKKOTTAI"));
    }

    #[test]
    fn test_decorations_stripped_before_lookup() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("Madurai Bus Stand").as_deref(), Some("MADURAI"));
        assert_eq!(normalizer.normalize("Salem (New) 2").as_deref(), Some("SALEM"));
    }

    #[test]
    fn test_tamil_names() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("மதுரை").as_deref(), Some("MADURAI"));
        assert_eq!(normalizer.normalize("திருச்சிராப்பள்ளி").as_deref(), Some("TRICHY"));
        assert_eq!(
            normalizer.normalize("மதுரை பேருந்து நிலையம்").as_deref(),
            Some("MADURAI")
        );
    }

    #[test]
    fn test_english_wins_over_tamil() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("சேலம் CHENNAI").as_deref(), Some("CHENNAI"));
    }

    #[test]
    fn test_multiple_places_pass_through() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(
            normalizer.normalize("chennai  trichy").as_deref(),
            Some("CHENNAI TRICHY")
        );
    }

    #[test]
    fn test_unknown_passes_through_uppercased() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("Karaikudi").as_deref(), Some("KARAIKUDI"));
        assert_eq!(normalizer.normalize("  "), None);
        assert_eq!(normalizer.normalize("-"), None);
    }

    #[test]
    fn test_names_run_together_by_ocr() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.normalize("MADURAIBUSSTAND").as_deref(), Some("MADURAI"));
        assert_eq!(normalizer.find_english("WELCOMETOMADURAI"), Some("MADURAI"));
        assert_eq!(normalizer.find_english("ARUPPUKKOTTAIBUSSTAND"), Some("ARUPPUKKOTTAI"));
    }

    #[test]
    fn test_longest_spelling_wins() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(english_matches("TIRUCHIRAPPALLI"), vec![(0, "TRICHY")]);
        assert_eq!(normalizer.normalize("RAMESHWARAMBUSSTAND").as_deref(), Some("RAMESWARAM"));
        assert_eq!(
            normalizer.normalize("CHENNAITRICHY").as_deref(),
            Some("CHENNAITRICHY")
        );
    }

    #[test]
    fn test_find_known_prefers_earliest() {
        let normalizer = LocationNormalizer::new();
        assert_eq!(normalizer.find_known("MADURAI TO CHENNAI"), Some("MADURAI"));
        assert_eq!(normalizer.find_known("அருப்புக்கோட்டை பேருந்து நிலையம்"), Some("ARUPPUKKOTTAI"));
        assert_eq!(normalizer.find_known("TIMINGS"), None);
    }
}
