//! Shared text utilities for candidate validation
//!
//! Normalization for dedup, word edit distance, the definition similarity ratio,
//! stable seeding, and word blanking for fill-in-the-blank items.

use regex::Regex;

/// Lowercase, trim and collapse internal whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive word equality used for polysemy safety
pub fn same_word(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Levenshtein distance between two words, case-insensitive
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(&normalize(a), &normalize(b))
}

/// Sequence similarity ratio in [0, 1]
///
/// `2 * M / T` where `T` is the total length of both strings and `M` the number of
/// characters in matching blocks, found by recursively taking the longest common
/// block and matching to its left and right (Ratcliff/Obershelp).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize(a).chars().collect();
    let b: Vec<char> = normalize(b).chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block in `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a` then `b`
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];

    for i in alo..ahi {
        let mut cur = vec![0usize; width + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = cur;
    }

    best
}

/// FNV-1a hash, stable across builds and platforms
///
/// Seeds derived from it must reproduce the same band samples on every build.
/// `std::collections::hash_map::DefaultHasher` does not promise that: its
/// algorithm may change between Rust releases.
pub fn stable_hash(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    text.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

/// Replace whole-word occurrences of `word` in `sentence` with `blank`
///
/// Returns `None` when the word does not occur verbatim.
pub fn blank_word(sentence: &str, word: &str, blank: &str) -> Option<String> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(word.trim()));
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(sentence) {
        return None;
    }
    Some(re.replace_all(sentence, blank).into_owned())
}
