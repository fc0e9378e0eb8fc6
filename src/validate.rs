//! Input normalization for phases, tiers, and export formats.
//!
//! Three-tier resolution: exact match → synonym lookup → error with
//! the closest suggestion (Levenshtein distance ≤ 3).

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

// ── Valid value sets (O(1) lookups) ──────────────────────────

pub static VALID_PHASES: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["summary", "scenes", "beats", "export"].into_iter().collect()
});

pub static VALID_TIERS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["free", "pro", "studio"].into_iter().collect());

pub static VALID_FORMATS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["markdown", "json"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static PHASE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("1", "summary"),
        ("2", "scenes"),
        ("3", "beats"),
        ("4", "export"),
        ("logline", "summary"),
        ("one-line", "summary"),
        ("oneline", "summary"),
        ("pitch", "summary"),
        ("scene", "scenes"),
        ("structure", "scenes"),
        ("outline", "scenes"),
        ("beat", "beats"),
        ("breakdown", "beats"),
        ("final", "export"),
        ("script", "export"),
    ]
    .into_iter()
    .collect()
});

pub static TIER_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("basic", "free"),
        ("trial", "free"),
        ("premium", "pro"),
        ("professional", "pro"),
        ("team", "studio"),
        ("enterprise", "studio"),
    ]
    .into_iter()
    .collect()
});

pub static FORMAT_SYNONYMS: LazyLock<HashMap<&str, &str>> =
    LazyLock::new(|| [("md", "markdown"), ("text", "markdown")].into_iter().collect());

/// Normalize a phase name via exact match or synonym lookup.
///
/// Returns the canonical phase, or an error with the original input
/// and an optional suggestion.
pub fn normalize_phase(input: &str) -> Result<String, (String, Option<String>)> {
    normalize(input, &VALID_PHASES, &PHASE_SYNONYMS)
}

/// Normalize a subscription tier name.
pub fn normalize_tier(input: &str) -> Result<String, (String, Option<String>)> {
    normalize(input, &VALID_TIERS, &TIER_SYNONYMS)
}

/// Normalize an export format name.
pub fn normalize_format(input: &str) -> Result<String, (String, Option<String>)> {
    normalize(input, &VALID_FORMATS, &FORMAT_SYNONYMS)
}

fn normalize(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Result<String, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    // Tier 1: exact match
    if valid.contains(lower.as_str()) {
        return Ok(lower);
    }

    // Tier 2: synonym lookup
    if let Some(&canonical) = synonyms.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    // Tier 3: find closest suggestion
    let suggestion = find_closest_match(&lower, valid, synonyms);
    Err((input.to_string(), suggestion))
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist > 3 {
            continue;
        }
        let is_better = best.is_none_or(|(_, d)| dist < d);
        if is_better {
            // For synonyms, show what it maps to
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}
