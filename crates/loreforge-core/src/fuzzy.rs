//! Fuzzy string matching for action-alias resolution.
//!
//! Consolidated tools accept an `action` discriminator typed by an LLM,
//! which means typos and near-synonyms. The router resolves them with
//! normalized edit-distance similarity: above [`DISPATCH_THRESHOLD`] the
//! call is transparently dispatched to the best candidate; below it, a
//! guiding error lists ranked suggestions -- the engine never silently
//! picks a low-confidence match.

/// Minimum similarity at which a fuzzy match is dispatched transparently.
pub const DISPATCH_THRESHOLD: f64 = 0.6;

/// Minimum similarity at which a candidate is worth suggesting.
const SUGGESTION_FLOOR: f64 = 0.3;

/// Maximum number of suggestions included in a guiding error.
const MAX_SUGGESTIONS: usize = 3;

/// A ranked near-match offered back to the caller.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Suggestion {
    /// The candidate action name.
    pub value: String,
    /// Similarity to the input, in [0, 1], rounded to two decimals.
    pub similarity: f64,
}

/// Levenshtein edit distance between two strings, by characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current: Vec<usize> = vec![0; b_chars.len().saturating_add(1)];

    for (i, a_char) in a_chars.iter().enumerate() {
        if let Some(first) = current.first_mut() {
            *first = i.saturating_add(1);
        }
        for (j, b_char) in b_chars.iter().enumerate() {
            let substitution_cost = usize::from(a_char != b_char);
            let deletion = previous.get(j.saturating_add(1)).copied().unwrap_or(0);
            let insertion = current.get(j).copied().unwrap_or(0);
            let substitution = previous.get(j).copied().unwrap_or(0);
            let cost = (deletion.saturating_add(1))
                .min(insertion.saturating_add(1))
                .min(substitution.saturating_add(substitution_cost));
            if let Some(cell) = current.get_mut(j.saturating_add(1)) {
                *cell = cost;
            }
        }
        core::mem::swap(&mut previous, &mut current);
    }

    previous.last().copied().unwrap_or(0)
}

/// Normalized similarity: `1 - distance / max_len`, case-insensitive.
/// Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let max_len = a_lower.chars().count().max(b_lower.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a_lower, &b_lower);
    #[allow(clippy::cast_precision_loss)]
    {
        1.0 - (distance as f64 / max_len as f64)
    }
}

/// The result of resolving an input string against a candidate set.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The input matched a candidate exactly (case-insensitive).
    Exact(String),
    /// The input matched a candidate fuzzily at or above
    /// [`DISPATCH_THRESHOLD`].
    Fuzzy {
        /// The matched candidate.
        value: String,
        /// The similarity that justified the dispatch.
        similarity: f64,
    },
    /// No candidate was close enough; here are the best near-misses.
    None(Vec<Suggestion>),
}

/// Resolve `input` against `candidates`.
///
/// Exact (case-insensitive) match wins outright. Otherwise the most
/// similar candidate is taken if it clears [`DISPATCH_THRESHOLD`]; ties
/// are broken lexicographically so resolution is deterministic.
pub fn resolve(input: &str, candidates: &[&str]) -> Resolution {
    let needle = input.trim().to_lowercase();

    for candidate in candidates {
        if candidate.to_lowercase() == needle {
            return Resolution::Exact((*candidate).to_owned());
        }
    }

    let mut ranked: Vec<Suggestion> = candidates
        .iter()
        .map(|candidate| Suggestion {
            value: (*candidate).to_owned(),
            similarity: round2(similarity(&needle, candidate)),
        })
        .collect();
    ranked.sort_by(|left, right| {
        right
            .similarity
            .partial_cmp(&left.similarity)
            .unwrap_or(core::cmp::Ordering::Equal)
            .then_with(|| left.value.cmp(&right.value))
    });

    if let Some(best) = ranked.first()
        && best.similarity >= DISPATCH_THRESHOLD
    {
        return Resolution::Fuzzy {
            value: best.value.clone(),
            similarity: best.similarity,
        };
    }

    ranked.retain(|suggestion| suggestion.similarity >= SUGGESTION_FLOOR);
    ranked.truncate(MAX_SUGGESTIONS);
    Resolution::None(ranked)
}

/// Round to two decimal places for stable wire output.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_distance_zero() {
        assert_eq!(levenshtein("steal", "steal"), 0);
        assert!((similarity("steal", "steal") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_counts_edits() {
        assert_eq!(levenshtein("sell", "sel"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn similarity_is_symmetric() {
        let ab = similarity("recognize", "recognise");
        let ba = similarity("recognise", "recognize");
        assert!((ab - ba).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let result = resolve("STEAL", &["steal", "sell", "check"]);
        assert_eq!(result, Resolution::Exact(String::from("steal")));
    }

    #[test]
    fn close_typo_dispatches_fuzzily() {
        let result = resolve("sel", &["steal", "sell", "check"]);
        match result {
            Resolution::Fuzzy { value, similarity } => {
                assert_eq!(value, "sell");
                assert!(similarity >= DISPATCH_THRESHOLD);
            }
            other => panic!("expected fuzzy resolution, got {other:?}"),
        }
    }

    #[test]
    fn garbage_returns_suggestions_not_a_pick() {
        let result = resolve("xyz", &["steal", "sell", "check", "report"]);
        match result {
            Resolution::None(suggestions) => {
                assert!(suggestions.len() <= 3);
                for pair in suggestions.windows(2) {
                    if let [first, second] = pair {
                        assert!(first.similarity >= second.similarity);
                    }
                }
            }
            other => panic!("expected no resolution, got {other:?}"),
        }
    }

    #[test]
    fn ties_break_lexicographically() {
        // "bat" is equidistant from "cat" and "hat"; "cat" sorts first.
        let result = resolve("bat", &["hat", "cat"]);
        match result {
            Resolution::Fuzzy { value, .. } => assert_eq!(value, "cat"),
            other => panic!("expected fuzzy resolution, got {other:?}"),
        }
    }
}
