//! Transcript analysis.
//!
//! Transcripts are plain text with `NAME: line` dialogue, free narration,
//! and `(...)` or `[...]` stage directions.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Speaking pace used for the runtime estimate.
const WORDS_PER_MINUTE: usize = 150;

const MAX_CANDIDATES: usize = 10;

static SPEAKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z][A-Za-z0-9 .'-]{0,30}?)\s*:\s+(\S.*)$").expect("valid regex")
});

static CAPITALISED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]{2,}\b").expect("valid regex"));

/// Capitalised words that are almost never names.
const COMMON_WORDS: &[&str] = &[
    "The", "And", "But", "That", "This", "There", "Then", "They", "What", "When", "Where", "Why",
    "How", "Who", "You", "Your", "Yes", "Yeah", "Okay", "Well", "Just", "Now", "Not", "Our", "She",
    "Her", "His", "Him", "It's", "We're", "Let", "Are", "Was", "Were", "Can", "Did", "For", "With",
    "From", "Into", "Its", "All", "One", "Good", "Hey", "Look", "Come", "Please", "Thank", "Thanks",
    "Sorry", "Maybe", "Here", "Because", "After", "Before", "Int", "Ext",
];

/// Per-speaker totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeakerStats {
    pub name: String,
    pub turns: usize,
    pub words: usize,
}

/// A recurring capitalised name that never speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterCandidate {
    pub name: String,
    pub mentions: usize,
}

/// Summary statistics for a transcript.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptAnalysis {
    /// Sorted by turns (descending), then name.
    pub speakers: Vec<SpeakerStats>,
    pub total_lines: usize,
    pub total_words: usize,
    pub dialogue_turns: usize,
    pub narration_lines: usize,
    pub stage_directions: usize,
    pub estimated_minutes: usize,
    pub character_candidates: Vec<CharacterCandidate>,
}

/// Analyze a transcript body.
#[must_use]
pub fn analyze(body: &str) -> TranscriptAnalysis {
    let mut speakers: BTreeMap<String, SpeakerStats> = BTreeMap::new();
    let mut mentions: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_lines = 0;
    let mut dialogue_turns = 0;
    let mut narration_lines = 0;
    let mut stage_directions = 0;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        total_lines += 1;

        let spoken = if is_stage_direction(line) {
            stage_directions += 1;
            line
        } else if let Some(caps) = SPEAKER_RE.captures(line) {
            let name = caps.get(1).map_or("", |m| m.as_str().trim());
            let text = caps.get(2).map_or("", |m| m.as_str());
            dialogue_turns += 1;
            let entry = speakers
                .entry(name.to_uppercase())
                .or_insert_with(|| SpeakerStats {
                    name: name.to_string(),
                    turns: 0,
                    words: 0,
                });
            entry.turns += 1;
            entry.words += text.split_whitespace().count();
            text
        } else {
            narration_lines += 1;
            line
        };

        for m in CAPITALISED_RE.find_iter(spoken) {
            *mentions.entry(m.as_str().to_string()).or_default() += 1;
        }
    }

    let speaker_words: HashSet<String> = speakers
        .keys()
        .flat_map(|k| k.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .collect();

    let mut character_candidates: Vec<CharacterCandidate> = mentions
        .into_iter()
        .filter(|(name, count)| {
            *count >= 2
                && !COMMON_WORDS.contains(&name.as_str())
                && !speaker_words.contains(&name.to_uppercase())
        })
        .map(|(name, mentions)| CharacterCandidate { name, mentions })
        .collect();
    character_candidates.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.name.cmp(&b.name)));
    character_candidates.truncate(MAX_CANDIDATES);

    let mut speakers: Vec<SpeakerStats> = speakers.into_values().collect();
    speakers.sort_by(|a, b| b.turns.cmp(&a.turns).then_with(|| a.name.cmp(&b.name)));

    let total_words = body.split_whitespace().count();

    TranscriptAnalysis {
        speakers,
        total_lines,
        total_words,
        dialogue_turns,
        narration_lines,
        stage_directions,
        estimated_minutes: total_words.div_ceil(WORDS_PER_MINUTE),
        character_candidates,
    }
}

fn is_stage_direction(line: &str) -> bool {
    (line.starts_with('(') && line.ends_with(')')) || (line.starts_with('[') && line.ends_with(']'))
}
