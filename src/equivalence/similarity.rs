//! Scoring of candidate names from a target backend's index.
//!
//! `score = 0.7 × (1 − lev / max_len) + 0.3 × jaccard(tokens)`, tokens split
//! on `-`, `_`, `.`, `+` and at letter/digit boundaries. A candidate is
//! accepted at [`MIN_CONFIDENCE`] or above; ties break by score, then edit
//! distance, then name.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Lowest score accepted as an equivalent.
pub const MIN_CONFIDENCE: f64 = 0.75;

/// Weight of the normalized edit-distance term.
const EDIT_WEIGHT: f64 = 0.7;

/// Weight of the token-overlap term.
const TOKEN_WEIGHT: f64 = 0.3;

/// What: Compute the Levenshtein edit distance between two strings.
///
/// Inputs:
/// - `a`: First string.
/// - `b`: Second string.
///
/// Output:
/// - Minimum number of single-character edits turning `a` into `b`.
///
/// Details:
/// - Uses a rolling dynamic programming row; works on chars, not bytes.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut dp: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut prev = dp[0];
        dp[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let tmp = dp[j + 1];
            let cost = usize::from(ca != *cb);
            dp[j + 1] = (dp[j + 1] + 1).min(dp[j] + 1).min(prev + cost);
            prev = tmp;
        }
    }
    dp[b.len()]
}

/// Name tokens split on `-`, `_`, `.`, `+` and where letters meet digits
/// (`gtk3` → `gtk`, `3`).
fn tokens(name: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut current = String::new();
    let mut last_digit: Option<bool> = None;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.' | '+') {
            if !current.is_empty() {
                out.insert(std::mem::take(&mut current));
            }
            last_digit = None;
            continue;
        }
        let digit = c.is_ascii_digit();
        if last_digit.is_some_and(|d| d != digit) && !current.is_empty() {
            out.insert(std::mem::take(&mut current));
        }
        current.push(c.to_ascii_lowercase());
        last_digit = Some(digit);
    }
    if !current.is_empty() {
        out.insert(current);
    }
    out
}

/// Jaccard index of the two token sets; two empty sets count as identical.
fn jaccard(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    let union = ta.union(&tb).count();
    if union == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = ta.intersection(&tb).count() as f64 / union as f64;
    ratio
}

/// One scored candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct Scored {
    /// Candidate name.
    pub name: String,
    /// Combined score in `[0, 1]`.
    pub score: f64,
    /// Edit distance to the query.
    pub distance: usize,
}

/// What: Score `candidate` against `query`.
///
/// Inputs:
/// - `query`: Normalized source name.
/// - `candidate`: Name from the target index.
///
/// Output:
/// - Score and distance.
#[must_use]
pub fn score(query: &str, candidate: &str) -> Scored {
    let distance = levenshtein(query, candidate);
    let longest = query.chars().count().max(candidate.chars().count());
    #[allow(clippy::cast_precision_loss)]
    let edit = if longest == 0 {
        1.0
    } else {
        1.0 - distance as f64 / longest as f64
    };
    Scored {
        name: candidate.to_string(),
        score: EDIT_WEIGHT.mul_add(edit, TOKEN_WEIGHT * jaccard(query, candidate)),
        distance,
    }
}

/// Ranking: higher score, then smaller distance, then lexicographic name.
fn rank(a: &Scored, b: &Scored) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.distance.cmp(&b.distance))
        .then_with(|| a.name.cmp(&b.name))
}

/// What: Pick the best candidate at or above the confidence floor.
///
/// Inputs:
/// - `query`: Normalized source name.
/// - `candidates`: Names returned by the target backend's search.
///
/// Output:
/// - Best candidate, or `None` when nothing reaches [`MIN_CONFIDENCE`].
///
/// Details:
/// - Candidates that do not fuzzy-match the query's longest token are
///   discarded before scoring; search results on large indexes are mostly noise.
#[must_use]
pub fn best_match(query: &str, candidates: &[String]) -> Option<Scored> {
    let matcher = SkimMatcherV2::default();
    let anchor = tokens(query)
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
        .unwrap_or_else(|| query.to_string());
    let mut scored: Vec<Scored> = candidates
        .iter()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| matcher.fuzzy_match(c, &anchor).is_some())
        .map(|c| score(query, &c))
        .filter(|s| s.score >= MIN_CONFIDENCE)
        .collect();
    scored.sort_by(rank);
    scored.dedup_by(|a, b| a.name == b.name);
    scored.into_iter().next()
}
