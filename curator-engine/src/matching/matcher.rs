//! Canonical-value identity matcher

use super::comparators::{
    normalize_identifier, ExactIdentifierComparator, FieldComparator, LevenshteinComparator,
    HARD_IDENTIFIER_KEYS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weight the title field receives when present in the fuzzy pass
const TITLE_WEIGHT: f64 = 0.5;

/// Similarity thresholds for dispositions
#[derive(Debug, Clone, Copy)]
pub struct MatchThresholds {
    pub auto_link: f64,
    pub review: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            auto_link: 0.85,
            review: 0.60,
        }
    }
}

/// Verdict for a proposed hub link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    AutoLinked,
    NeedsReview,
    Rejected,
}

impl Disposition {
    pub fn from_similarity(similarity: f64, thresholds: &MatchThresholds) -> Self {
        if similarity >= thresholds.auto_link {
            Disposition::AutoLinked
        } else if similarity >= thresholds.review {
            Disposition::NeedsReview
        } else {
            Disposition::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::AutoLinked => "AutoLinked",
            Disposition::NeedsReview => "NeedsReview",
            Disposition::Rejected => "Rejected",
        }
    }
}

/// Result of comparing two entities' canonical values
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub similarity: f64,
    /// True when a hard identifier short-circuited the comparison
    pub hard: bool,
    /// Identifier keys whose normalised values matched
    pub matched_identifiers: Vec<String>,
}

/// Compares two sets of canonical values
///
/// Pass 1 walks the fixed hard-identifier set: any key present on both
/// sides with equal normalised values short-circuits at similarity 1.0.
/// Pass 2 intersects the remaining keys and returns a weighted mean of
/// per-key comparator scores; `title` takes half the total weight when
/// present and the other shared keys split the rest equally.
pub struct IdentityMatcher {
    comparators: Vec<Box<dyn FieldComparator>>,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityMatcher {
    /// Matcher with the standard comparator list, exact identifiers first
    pub fn new() -> Self {
        Self {
            comparators: vec![
                Box::new(ExactIdentifierComparator),
                Box::new(LevenshteinComparator),
            ],
        }
    }

    /// Matcher with a custom comparator priority list
    pub fn with_comparators(comparators: Vec<Box<dyn FieldComparator>>) -> Self {
        Self { comparators }
    }

    /// Compare two entities by their canonical values
    pub fn compare(
        &self,
        a: &HashMap<String, String>,
        b: &HashMap<String, String>,
    ) -> MatchOutcome {
        // Pass 1: hard identifiers
        let mut matched = Vec::new();
        for key in HARD_IDENTIFIER_KEYS {
            let (Some(va), Some(vb)) = (a.get(*key), b.get(*key)) else {
                continue;
            };

            let na = normalize_identifier(va);
            if !na.is_empty() && na == normalize_identifier(vb) {
                matched.push((*key).to_string());
            }
        }

        if !matched.is_empty() {
            return MatchOutcome {
                similarity: 1.0,
                hard: true,
                matched_identifiers: matched,
            };
        }

        // Pass 2: fuzzy over the remaining shared keys
        let mut shared: Vec<&String> = a
            .keys()
            .filter(|k| b.contains_key(*k))
            .filter(|k| !HARD_IDENTIFIER_KEYS.contains(&k.as_str()))
            .collect();
        shared.sort();

        if shared.is_empty() {
            return MatchOutcome {
                similarity: 0.0,
                hard: false,
                matched_identifiers: vec![],
            };
        }

        let has_title = shared.iter().any(|k| k.as_str() == "title");
        let other_count = shared.len() - usize::from(has_title);

        let mut similarity = 0.0;
        for key in &shared {
            let weight = if key.as_str() == "title" {
                if other_count == 0 {
                    1.0
                } else {
                    TITLE_WEIGHT
                }
            } else if has_title {
                (1.0 - TITLE_WEIGHT) / other_count as f64
            } else {
                1.0 / other_count as f64
            };

            let score = self.score_key(key, &a[*key], &b[*key]);
            similarity += weight * score;
        }

        MatchOutcome {
            similarity,
            hard: false,
            matched_identifiers: vec![],
        }
    }

    /// Dispatch a single key to the first applicable comparator
    fn score_key(&self, key: &str, a: &str, b: &str) -> f64 {
        for comparator in &self.comparators {
            if comparator.applies_to(key) {
                return comparator.compare(key, a, b);
            }
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hard_identifier_short_circuits() {
        let matcher = IdentityMatcher::new();

        let a = values(&[("isbn", "978-0441013593"), ("title", "Dune")]);
        let b = values(&[("isbn", "urn:isbn:9780441013593"), ("title", "Dune Deluxe")]);

        let outcome = matcher.compare(&a, &b);
        assert_eq!(outcome.similarity, 1.0);
        assert!(outcome.hard);
        assert_eq!(outcome.matched_identifiers, vec!["isbn".to_string()]);
    }

    #[test]
    fn test_unequal_hard_identifier_falls_through_to_fuzzy() {
        let matcher = IdentityMatcher::new();

        let a = values(&[("isbn", "1111111111111"), ("title", "Dune")]);
        let b = values(&[("isbn", "2222222222222"), ("title", "Dune")]);

        let outcome = matcher.compare(&a, &b);
        assert!(!outcome.hard);
        // Titles identical, only shared fuzzy key
        assert_eq!(outcome.similarity, 1.0);
    }

    #[test]
    fn test_no_shared_keys_is_zero() {
        let matcher = IdentityMatcher::new();

        let a = values(&[("title", "Dune")]);
        let b = values(&[("author", "Frank Herbert")]);

        let outcome = matcher.compare(&a, &b);
        assert_eq!(outcome.similarity, 0.0);
        assert!(!outcome.hard);
    }

    #[test]
    fn test_title_takes_half_weight() {
        let matcher = IdentityMatcher::new();

        // title identical (score 1.0, weight 0.5)
        // author completely different short strings (score ~0, weight 0.5)
        let a = values(&[("title", "Dune"), ("author", "aaaa")]);
        let b = values(&[("title", "Dune"), ("author", "zzzz")]);

        let outcome = matcher.compare(&a, &b);
        assert!((outcome.similarity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_non_title_keys_share_equally() {
        let matcher = IdentityMatcher::new();

        let a = values(&[("author", "Frank Herbert"), ("publisher", "Ace")]);
        let b = values(&[("author", "Frank Herbert"), ("publisher", "Ace")]);

        let outcome = matcher.compare(&a, &b);
        assert!((outcome.similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_both_empty_values_score_one() {
        let matcher = IdentityMatcher::new();

        let a = values(&[("subtitle", "")]);
        let b = values(&[("subtitle", "")]);

        assert_eq!(matcher.compare(&a, &b).similarity, 1.0);
    }

    #[test]
    fn test_dispositions() {
        let thresholds = MatchThresholds::default();
        assert_eq!(
            Disposition::from_similarity(0.9, &thresholds),
            Disposition::AutoLinked
        );
        assert_eq!(
            Disposition::from_similarity(0.85, &thresholds),
            Disposition::AutoLinked
        );
        assert_eq!(
            Disposition::from_similarity(0.7, &thresholds),
            Disposition::NeedsReview
        );
        assert_eq!(
            Disposition::from_similarity(0.59, &thresholds),
            Disposition::Rejected
        );
    }
}
