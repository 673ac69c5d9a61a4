//! String similarity ratios used by the matching engine (spec.md §4.6,
//! §9 "portable implementation"). Four Levenshtein-based ratios —
//! full, partial, token-sort, token-set — the max of which is
//! `name_similarity`. `strsim` provides the Levenshtein primitive; the
//! token-based ratios are composed on top of it, the same way
//! `other_examples/.../pricing-matching.rs` layers `jaro_winkler` under a
//! higher-level scorer.

use strsim::normalized_levenshtein;

/// Levenshtein similarity of the two full strings, in [0,1].
pub fn full_ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Best alignment of the shorter string against any equal-length window
/// of the longer one — approximates fuzzywuzzy's `partial_ratio`.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.is_empty() {
        return if longer.is_empty() { 1.0 } else { 0.0 };
    }
    if shorter.len() >= longer.len() {
        return normalized_levenshtein(shorter, longer);
    }

    let longer_chars: Vec<char> = longer.chars().collect();
    let window = shorter.chars().count();
    let mut best = 0.0f64;
    for start in 0..=(longer_chars.len() - window) {
        let slice: String = longer_chars[start..start + window].iter().collect();
        let score = normalized_levenshtein(shorter, &slice);
        if score > best {
            best = score;
        }
    }
    best
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Full ratio of the whitespace-token-sorted strings.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    full_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Full ratio of the intersection/union token sets, rendered back to
/// sorted strings — approximates fuzzywuzzy's `token_set_ratio`.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    use std::collections::BTreeSet;

    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let sorted_intersection = intersection.join(" ");
    let combined_a = format!("{} {}", sorted_intersection, diff_a.join(" ")).trim().to_string();
    let combined_b = format!("{} {}", sorted_intersection, diff_b.join(" ")).trim().to_string();

    full_ratio(&combined_a, &combined_b).max(full_ratio(&sorted_intersection, &combined_a)).max(full_ratio(&sorted_intersection, &combined_b))
}

/// Max over the four ratios, scaled to [0,1] (spec.md §4.6 `name_similarity`).
pub fn name_similarity(a: &str, b: &str) -> f64 {
    full_ratio(a, b)
        .max(partial_ratio(a, b))
        .max(token_sort_ratio(a, b))
        .max(token_set_ratio(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(full_ratio("indomie goreng", "indomie goreng"), 1.0);
    }

    #[test]
    fn token_sort_ignores_word_order() {
        let score = token_sort_ratio("goreng indomie", "indomie goreng");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn near_duplicate_names_score_highly() {
        let score = name_similarity("indomie goreng 85g", "indomee goreng 85 g");
        assert!(score >= 0.85, "expected high similarity, got {score}");
    }

    #[test]
    fn unrelated_strings_score_low() {
        let score = name_similarity("rice 5kg", "shampoo 200ml");
        assert!(score < 0.5);
    }
}
