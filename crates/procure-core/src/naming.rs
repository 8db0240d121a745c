//! Group name derivation

use crate::classify::{GENERAL_SUBCATEGORY, OTHER_CATEGORY};
use crate::models::Item;
use crate::similarity::ItemProfile;

/// Words that never make a good group name on their own
pub const NOISE_WORDS: &[&str] = &[
    "the", "and", "or", "with", "for", "in", "on", "at", "by", "from", "to", "of", "a", "an",
];

/// Name used when cleaning leaves nothing
pub const UNGROUPED_NAME: &str = "Ungrouped";

/// Keyword tiers reported by the classifier; not useful as a name prefix
const TIER_LABELS: &[&str] = &["primary", "secondary"];

/// Title-case: first cased character of every word upper, the rest lower.
///
/// Any non-alphabetic character starts a new word, so "o'neil" becomes "O'Neil".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if previous_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(c);
            previous_cased = false;
        }
    }
    out
}

/// Trim, collapse whitespace and title-case; "Ungrouped" when empty
pub fn clean_group_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return UNGROUPED_NAME.to_string();
    }
    title_case(&collapsed)
}

/// Cut names longer than `max_len` characters to `max_len - 3` plus "..."
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = name.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Display name for a core type key such as "food_beverages"
pub fn core_type_display(core_type: &str) -> String {
    title_case(&core_type.replace('_', " "))
}

/// Name a cluster of items.
///
/// Uses the up-to-three most frequent meaningful words shared by at least
/// half of the members, else the seed's core type, else the most common
/// first word.
pub fn cluster_name(items: &[Item], profiles: &[ItemProfile], core_type: &str, sub_type: &str, max_len: usize) -> String {
    if items.is_empty() {
        return "Empty Group".to_string();
    }
    if items.len() == 1 {
        return truncate_name(&clean_group_name(&items[0].name), max_len);
    }

    let mut counts: Vec<(String, usize)> = Vec::new();
    for profile in profiles {
        for word in profile.normalized.split_whitespace() {
            let word = word.to_lowercase();
            if word.chars().count() <= 2 || NOISE_WORDS.contains(&word.as_str()) {
                continue;
            }
            bump(&mut counts, word);
        }
    }
    let shared_by = items.len() as f64 * 0.5;
    let common: Vec<String> = most_common(counts, 3)
        .into_iter()
        .filter(|(_, count)| *count as f64 >= shared_by)
        .map(|(word, _)| word)
        .collect();

    let name = if !common.is_empty() {
        title_case(&common.join(" "))
    } else if core_type != OTHER_CATEGORY {
        let base = core_type_display(core_type);
        if sub_type != GENERAL_SUBCATEGORY && sub_type != core_type && !TIER_LABELS.contains(&sub_type) {
            format!("{} {}", title_case(sub_type), base)
        } else {
            base
        }
    } else {
        let mut first_words = Vec::new();
        for item in items {
            if let Some(word) = item.name.split_whitespace().next() {
                bump(&mut first_words, word.to_string());
            }
        }
        match most_common(first_words, 1).into_iter().next() {
            Some((word, _)) => format!("{} Products", word),
            None => "Similar Products".to_string(),
        }
    };

    truncate_name(&clean_group_name(&name), max_len)
}

/// Increment `word` in an insertion-ordered counter
pub(crate) fn bump(counts: &mut Vec<(String, usize)>, word: String) {
    tally(counts, word, 1);
}

/// Add `n` to `word` in an insertion-ordered counter
pub(crate) fn tally(counts: &mut Vec<(String, usize)>, word: String, n: usize) {
    match counts.iter_mut().find(|(w, _)| *w == word) {
        Some((_, count)) => *count += n,
        None => counts.push((word, n)),
    }
}

/// Top `n` entries by count; ties keep first-seen order
pub(crate) fn most_common(mut counts: Vec<(String, usize)>, n: usize) -> Vec<(String, usize)> {
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
}
