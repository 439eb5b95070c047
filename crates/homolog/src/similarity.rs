//! Similarity scoring between normalized keys (0–100).

use strsim::normalized_levenshtein;

/// Default floor applied when one compact key contains the other.
pub const CONTAINMENT_FLOOR: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    containment_floor: f64,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            containment_floor: CONTAINMENT_FLOOR,
        }
    }
}

impl Scorer {
    pub fn new(containment_floor: f64) -> Self {
        Self {
            containment_floor: containment_floor.clamp(0.0, 100.0),
        }
    }

    /// Max of compact ratio (with containment floor) and token-sort ratio.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let compact_a = compact(a);
        let compact_b = compact(b);

        let mut compact_score = ratio(&compact_a, &compact_b);
        if !compact_a.is_empty()
            && !compact_b.is_empty()
            && (compact_a.contains(&compact_b) || compact_b.contains(&compact_a))
        {
            compact_score = compact_score.max(self.containment_floor);
        }

        compact_score.max(token_sort_ratio(a, b)).clamp(0.0, 100.0)
    }
}

/// Score with the default containment floor.
pub fn similarity(a: &str, b: &str) -> f64 {
    Scorer::default().score(a, b)
}

/// Edit-distance ratio on the strings with all whitespace removed.
pub fn compact_ratio(a: &str, b: &str) -> f64 {
    ratio(&compact(a), &compact(b))
}

/// Edit-distance ratio after sorting each string's tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
