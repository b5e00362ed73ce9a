//! Name matching pipeline
//!
//! Four stages, tried in order per candidate: case-insensitive equality,
//! equality after normalization, substring containment, Levenshtein edit
//! distance. The score constants are behavioral contracts; do not re-derive
//! them.

use tally_core::MatchKind;

/// Legal-entity suffixes stripped during normalization.
const LEGAL_SUFFIXES: [&str; 8] = ["inc", "llc", "ltd", "corp", "co", "plc", "gmbh", "ag"];

/// Normalize a display name for comparison: lowercase, strip punctuation,
/// collapse whitespace, drop trailing legal-entity suffixes.
pub fn normalize_name(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut words: Vec<&str> = lowered.split_whitespace().collect();
    while let Some(last) = words.last() {
        if words.len() > 1 && LEGAL_SUFFIXES.contains(last) {
            words.pop();
        } else {
            break;
        }
    }
    words.join(" ")
}

/// Score a candidate name against the query.
pub fn score_match(query: &str, candidate: &str) -> (f64, MatchKind) {
    let query_trimmed = query.trim();
    if query_trimmed.to_lowercase() == candidate.trim().to_lowercase() {
        return (1.0, MatchKind::Exact);
    }

    let nq = normalize_name(query_trimmed);
    let nc = normalize_name(candidate);

    if !nq.is_empty() && nq == nc {
        return (0.95, MatchKind::Normalized);
    }

    if !nq.is_empty() && !nc.is_empty() && (nc.contains(&nq) || nq.contains(&nc)) {
        let len_q = nq.chars().count() as f64;
        let len_c = nc.chars().count() as f64;
        let ratio = len_q.min(len_c) / len_q.max(len_c);
        return (0.7 + 0.2 * ratio, MatchKind::Partial);
    }

    let max_len = nq.chars().count().max(nc.chars().count());
    if max_len == 0 {
        return (0.0, MatchKind::Fuzzy);
    }
    let distance = strsim::levenshtein(&nq, &nc);
    let confidence = (1.0 - distance as f64 / max_len as f64).max(0.0);
    (confidence, MatchKind::Fuzzy)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_suffix_and_punctuation() {
        assert_eq!(normalize_name("Acme Inc."), "acme");
        assert_eq!(normalize_name("Müller GmbH"), "müller");
        assert_eq!(normalize_name("Wayne  Enterprises, Ltd"), "wayne enterprises");
        assert_eq!(normalize_name("  Globex   Corp "), "globex");
    }

    #[test]
    fn test_normalize_keeps_suffix_only_names() {
        // A name that IS a suffix word must not normalize to nothing.
        assert_eq!(normalize_name("Co"), "co");
        assert_eq!(normalize_name("AG"), "ag");
    }

    #[test]
    fn test_exact_match_case_insensitive() {
        assert_eq!(score_match("Acme", "Acme"), (1.0, MatchKind::Exact));
        assert_eq!(score_match("acme", "ACME"), (1.0, MatchKind::Exact));
    }

    #[test]
    fn test_normalized_match_scores_095() {
        let (confidence, kind) = score_match("Acme", "Acme Inc.");
        assert_eq!(kind, MatchKind::Normalized);
        assert!((confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_partial_match_scales_with_length_ratio() {
        let (confidence, kind) = score_match("Acme", "Acme Widgets");
        assert_eq!(kind, MatchKind::Partial);
        // "acme" (4) inside "acme widgets" (12): 0.7 + 0.2 * 4/12
        assert!((confidence - (0.7 + 0.2 * (4.0 / 12.0))).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_match_uses_edit_distance() {
        let (confidence, kind) = score_match("Axme", "Acme");
        assert_eq!(kind, MatchKind::Fuzzy);
        // distance 1 over max length 4
        assert!((confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_unrelated_is_low() {
        let (confidence, kind) = score_match("Acme", "Zzzzzzzzzz");
        assert_eq!(kind, MatchKind::Fuzzy);
        assert!(confidence < 0.2);
    }
}

// =============================================================================
// PROPERTY-BASED TESTS
// =============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Confidence always lands in [0, 1].
        #[test]
        fn prop_confidence_bounded(query in ".{0,40}", candidate in ".{0,40}") {
            let (confidence, _) = score_match(&query, &candidate);
            prop_assert!((0.0..=1.0).contains(&confidence));
        }

        /// A candidate equal to the query (any case) is always Exact.
        #[test]
        fn prop_identity_is_exact(name in "[A-Za-z][A-Za-z0-9 ]{0,30}") {
            let (confidence, kind) = score_match(&name, &name);
            prop_assert_eq!(kind, MatchKind::Exact);
            prop_assert_eq!(confidence, 1.0);
        }

        /// Normalization is idempotent.
        #[test]
        fn prop_normalize_idempotent(name in ".{0,40}") {
            let once = normalize_name(&name);
            prop_assert_eq!(normalize_name(&once), once.clone());
        }
    }
}
