//! Field comparator strategies
//!
//! Comparators are interface-dispatched over `(key, a, b) → score`; the
//! matcher walks its comparator list and the first whose `applies_to`
//! returns true wins.

/// Identifier keys that short-circuit matching when equal
pub const HARD_IDENTIFIER_KEYS: &[&str] = &[
    "isbn",
    "imdbid",
    "tmdbid",
    "ean",
    "asin",
    "musicbrainzid",
    "openlibrary_id",
];

/// Known URI-style prefixes stripped during identifier normalisation
const IDENTIFIER_PREFIXES: &[&str] = &["urn:isbn:", "isbn:", "ean:", "asin:", "tt"];

/// Normalise an identifier value for comparison
///
/// Strips whitespace and hyphens, lower-cases, and removes known URI
/// prefixes (`urn:isbn:`, `isbn:`, `tt`, `ean:`, `asin:`).
pub fn normalize_identifier(value: &str) -> String {
    let mut normalised: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_lowercase();

    for prefix in IDENTIFIER_PREFIXES {
        if let Some(rest) = normalised.strip_prefix(prefix) {
            normalised = rest.to_string();
            break;
        }
    }

    normalised
}

/// One comparison strategy
pub trait FieldComparator: Send + Sync {
    /// Whether this comparator handles the given claim key
    fn applies_to(&self, key: &str) -> bool;

    /// Similarity of two values for `key`, in [0, 1]
    fn compare(&self, key: &str, a: &str, b: &str) -> f64;
}

/// Exact comparison over normalised hard identifiers
pub struct ExactIdentifierComparator;

impl FieldComparator for ExactIdentifierComparator {
    fn applies_to(&self, key: &str) -> bool {
        HARD_IDENTIFIER_KEYS.contains(&key)
    }

    fn compare(&self, _key: &str, a: &str, b: &str) -> f64 {
        let na = normalize_identifier(a);
        let nb = normalize_identifier(b);
        if !na.is_empty() && na == nb {
            1.0
        } else {
            0.0
        }
    }
}

/// Normalised Levenshtein similarity for free-text fields
///
/// `1 − distance / max(len)`; both empty compares as 1.0, exactly one
/// empty as 0.0.
pub struct LevenshteinComparator;

impl FieldComparator for LevenshteinComparator {
    fn applies_to(&self, _key: &str) -> bool {
        true
    }

    fn compare(&self, _key: &str, a: &str, b: &str) -> f64 {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();

        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let len_a = a.chars().count();
        let len_b = b.chars().count();
        let distance = levenshtein_distance(&a, &b);

        1.0 - (distance as f64 / len_a.max(len_b) as f64)
    }
}

/// Minimum number of single-character edits to transform s1 into s2
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let chars1: Vec<char> = s1.chars().collect();
    let chars2: Vec<char> = s2.chars().collect();
    let len1 = chars1.len();
    let len2 = chars2.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut previous: Vec<usize> = (0..=len2).collect();
    let mut current = vec![0usize; len2 + 1];

    for i in 1..=len1 {
        current[0] = i;
        for j in 1..=len2 {
            let cost = if chars1[i - 1] == chars2[j - 1] { 0 } else { 1 };
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[len2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_hyphens_and_spaces() {
        assert_eq!(normalize_identifier("978-0-441-01359-3"), "9780441013593");
        assert_eq!(normalize_identifier(" 978 0441013593 "), "9780441013593");
    }

    #[test]
    fn test_normalize_strips_prefixes() {
        assert_eq!(normalize_identifier("urn:isbn:9780441013593"), "9780441013593");
        assert_eq!(normalize_identifier("ISBN:9780441013593"), "9780441013593");
        assert_eq!(normalize_identifier("tt0087182"), "0087182");
        assert_eq!(normalize_identifier("ean:4006381333931"), "4006381333931");
        assert_eq!(normalize_identifier("asin:B000FBJCJE"), "b000fbjcje");
    }

    #[test]
    fn test_exact_identifier_comparator() {
        let cmp = ExactIdentifierComparator;
        assert!(cmp.applies_to("isbn"));
        assert!(cmp.applies_to("musicbrainzid"));
        assert!(!cmp.applies_to("title"));

        assert_eq!(
            cmp.compare("isbn", "978-0441013593", "urn:isbn:9780441013593"),
            1.0
        );
        assert_eq!(cmp.compare("isbn", "9780441013593", "9780000000000"), 0.0);
        assert_eq!(cmp.compare("isbn", "", ""), 0.0, "empty never hard-matches");
    }

    #[test]
    fn test_levenshtein_distance_basics() {
        assert_eq!(levenshtein_distance("hello", "hello"), 0);
        assert_eq!(levenshtein_distance("hello", "hallo"), 1);
        assert_eq!(levenshtein_distance("", "hello"), 5);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_levenshtein_comparator_scores() {
        let cmp = LevenshteinComparator;
        assert!(cmp.applies_to("title"));

        assert_eq!(cmp.compare("title", "Dune", "Dune"), 1.0);
        assert_eq!(cmp.compare("title", "Dune", "dune"), 1.0);
        assert_eq!(cmp.compare("title", "", ""), 1.0);
        assert_eq!(cmp.compare("title", "Dune", ""), 0.0);

        // "hello" vs "hallo": distance 1 over len 5
        assert!((cmp.compare("title", "hello", "hallo") - 0.8).abs() < 1e-9);
    }
}
