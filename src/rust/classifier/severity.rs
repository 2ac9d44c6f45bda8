//! Severity levels and the parse step that pulls a level out of free-form model output.

use std::fmt;

/// Phrases a generative model uses to say it could not assess the symptoms.
const INDETERMINATE_MARKERS: &[&str] = &["ไม่สามารถประเมินได้", "indeterminate", "cannot be assessed"];

/// An ESI level, always within `1..=5` (1 is most urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeverityLevel(u8);

impl SeverityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Returns `None` when `level` is outside `1..=5`.
    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    /// Maps a zero-based classifier label index to a level (`0` is ESI 1).
    pub fn from_label_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of classification: a level, or no usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Level(SeverityLevel),
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeverityResult {
    pub assessment: Assessment,
    pub rationale: Option<String>,
}

impl SeverityResult {
    pub fn level(level: SeverityLevel) -> Self {
        Self {
            assessment: Assessment::Level(level),
            rationale: None,
        }
    }

    pub fn indeterminate() -> Self {
        Self {
            assessment: Assessment::Indeterminate,
            rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        let rationale = rationale.into();
        self.rationale = (!rationale.trim().is_empty()).then_some(rationale);
        self
    }

    pub fn severity(&self) -> Option<SeverityLevel> {
        match self.assessment {
            Assessment::Level(level) => Some(level),
            Assessment::Indeterminate => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.assessment == Assessment::Indeterminate
    }
}

/// Extracts an ESI level from generated text.
///
/// Resolution order:
/// 1. an explicit marker such as `ESI 2`, `ESI-2`, `esi: 2` or `ESI level 2`
/// 2. an explicit "cannot assess" phrase, which yields `Indeterminate`
/// 3. the first standalone digit `1`..`5` (digits inside longer numbers are skipped)
///
/// Anything else is `Indeterminate`.
pub fn parse_level(text: &str) -> Assessment {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();

    if let Some(level) = find_marked_level(lowered.as_bytes()) {
        return Assessment::Level(level);
    }
    if INDETERMINATE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Assessment::Indeterminate;
    }
    match find_standalone_digit(lowered.as_bytes()) {
        Some(level) => Assessment::Level(level),
        None => Assessment::Indeterminate,
    }
}

fn find_marked_level(bytes: &[u8]) -> Option<SeverityLevel> {
    const MARKER: &[u8] = b"esi";
    const LEVEL_WORD: &[u8] = b"level";

    let mut start = 0;
    while let Some(offset) = find(&bytes[start..], MARKER) {
        let at = start + offset;
        start = at + MARKER.len();
        if at > 0 && bytes[at - 1].is_ascii_alphanumeric() {
            continue;
        }
        let mut i = skip_separators(bytes, start);
        if bytes[i..].starts_with(LEVEL_WORD) {
            i = skip_separators(bytes, i + LEVEL_WORD.len());
        }
        if let Some(level) = digit_at(bytes, i) {
            return Some(level);
        }
    }
    None
}

fn find_standalone_digit(bytes: &[u8]) -> Option<SeverityLevel> {
    (0..bytes.len()).find_map(|i| {
        let before_is_digit = i > 0 && bytes[i - 1].is_ascii_digit();
        let before_is_decimal = i > 1 && bytes[i - 1] == b'.' && bytes[i - 2].is_ascii_digit();
        if before_is_digit || before_is_decimal {
            None
        } else {
            digit_at(bytes, i)
        }
    })
}

/// A level digit at `i` that is not followed by another digit or a decimal part.
fn digit_at(bytes: &[u8], i: usize) -> Option<SeverityLevel> {
    let b = *bytes.get(i)?;
    if !(b'1'..=b'5').contains(&b) {
        return None;
    }
    match bytes.get(i + 1) {
        Some(next) if next.is_ascii_digit() => None,
        Some(b'.') if bytes.get(i + 2).is_some_and(|c| c.is_ascii_digit()) => None,
        _ => SeverityLevel::new(b - b'0'),
    }
}

fn skip_separators(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'-' | b':' | b'=' | b'#' | b'(') {
        i += 1;
    }
    i
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
