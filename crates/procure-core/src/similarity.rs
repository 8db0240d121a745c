//! Pairwise item similarity
//!
//! `0.4 * type_match + 0.3 * string_similarity + 0.2 * word_overlap + 0.1 * category_match`
//!
//! All four components are symmetric, so `similarity(a, b) == similarity(b, a)`.

use std::collections::{BTreeSet, HashMap};

use crate::classify::{Classification, Classifier};
use crate::models::Item;

pub const TYPE_WEIGHT: f64 = 0.4;
pub const STRING_WEIGHT: f64 = 0.3;
pub const WORD_WEIGHT: f64 = 0.2;
pub const CATEGORY_WEIGHT: f64 = 0.1;

const UNKNOWN_CATEGORY: &str = "unknown";

/// Everything the scorer needs about one item, computed once
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProfile {
    pub normalized: String,
    pub tokens: BTreeSet<String>,
    pub classification: Classification,
    /// Lower-cased raw category
    pub category: String,
}

impl ItemProfile {
    /// Normalized tokens in name order, duplicates kept
    pub fn key_words(&self) -> Vec<String> {
        self.normalized.split_whitespace().map(str::to_string).collect()
    }
}

/// Similarity scorer backed by a classifier
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    classifier: Classifier,
}

impl SimilarityScorer {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Profile a name/category pair
    pub fn profile_of(&self, name: &str, category: &str) -> ItemProfile {
        let normalized = self.classifier.normalizer().normalize(name);
        let classification = self.classifier.classify_normalized(&normalized);
        let tokens = normalized.split_whitespace().map(str::to_string).collect();
        ItemProfile {
            normalized,
            tokens,
            classification,
            category: category.to_lowercase(),
        }
    }

    pub fn profile(&self, item: &Item) -> ItemProfile {
        self.profile_of(&item.name, &item.category)
    }

    /// Profile `item` and record the derived fields on it
    pub fn annotate(&self, item: &mut Item) -> ItemProfile {
        let profile = self.profile(item);
        item.normalized_name = Some(profile.normalized.clone());
        item.core_type = Some(profile.classification.category.clone());
        item.sub_type = Some(profile.classification.subcategory.clone());
        item.confidence = Some(profile.classification.confidence);
        item.key_words = profile.key_words();
        profile
    }

    /// Similarity of two items in [0, 1]
    pub fn similarity(&self, a: &Item, b: &Item) -> f64 {
        score(&self.profile(a), &self.profile(b))
    }
}

/// Similarity of two profiled items in [0, 1]
pub fn score(a: &ItemProfile, b: &ItemProfile) -> f64 {
    let type_match = if a.classification.category == b.classification.category && !a.classification.is_other() {
        1.0
    } else {
        0.0
    };
    let string_similarity = sequence_ratio(&a.normalized, &b.normalized);
    let word_overlap = jaccard(&a.tokens, &b.tokens);
    let category_match = if a.category == b.category && a.category != UNKNOWN_CATEGORY {
        1.0
    } else {
        0.0
    };

    TYPE_WEIGHT * type_match
        + STRING_WEIGHT * string_similarity
        + WORD_WEIGHT * word_overlap
        + CATEGORY_WEIGHT * category_match
}

/// Mean similarity of `profile` against at most `cap` of `others`
pub fn average_similarity(profile: &ItemProfile, others: &[ItemProfile], cap: usize) -> f64 {
    let sample: Vec<&ItemProfile> = others.iter().take(cap.max(1)).collect();
    if sample.is_empty() {
        return 0.0;
    }
    sample.iter().map(|o| score(profile, o)).sum::<f64>() / sample.len() as f64
}

/// Jaccard index of two token sets; 0.0 if either is empty
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Longest-matching-blocks ratio `2M / T` in [0, 1].
///
/// The pair is put into a canonical order first so the result does not
/// depend on argument order.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = first.chars().collect();
    let b: Vec<char> = second.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of the recursively found longest common blocks
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        positions.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &positions, alo, ahi, blo, bhi);
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

/// Longest block `a[i..i+k] == b[j..j+k]` inside the window; earliest wins ties
fn longest_match(
    a: &[char],
    positions: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_runs = HashMap::new();
        if let Some(js) = positions.get(c) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 { run_lengths.get(&(j - 1)).copied().unwrap_or(0) } else { 0 } + 1;
                next_runs.insert(j, k);
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        run_lengths = next_runs;
    }
    (best_i, best_j, best_k)
}
