//! Edit-distance metrics used by the BK-tree.
//!
//! Distances are counted over Unicode scalar values, not bytes, so Cyrillic menus get the same
//! treatment as ASCII ones. Inputs are expected to be lower-cased already.

/// A distance function obeying the triangle inequality.
pub trait Metric: Send + Sync {
    fn distance(&self, a: &str, b: &str) -> usize;
}

/// Classic Levenshtein distance: insertions, deletions and substitutions all cost one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Levenshtein;

impl Metric for Levenshtein {
    fn distance(&self, a: &str, b: &str) -> usize {
        levenshtein(a, b)
    }
}

/// Levenshtein distance with a single rolling row.
///
/// The row is sized to the shorter string; the longer one is streamed, so auxiliary space is
/// `O(min(|a|, |b|))`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let (short, long) = if a_len <= b_len { (a, b) } else { (b, a) };
    let short: Vec<char> = short.chars().collect();

    // row[j] holds the distance between the consumed prefix of `long` and short[..j]
    let mut row: Vec<usize> = (0..=short.len()).collect();
    for (i, lc) in long.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &sc) in short.iter().enumerate() {
            let up = row[j + 1];
            let cost = usize::from(lc != sc);
            row[j + 1] = (up + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = up;
        }
    }
    row[short.len()]
}
