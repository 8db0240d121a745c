//! Core product type classification
//!
//! Maps a product name onto a fixed keyword taxonomy. Matching is a
//! token-level fuzzy containment: a token and a keyword match if either
//! contains the other, scoring `len(keyword) / max(len(token), len(keyword))`.
//! Primary keywords are scanned first; secondary keywords (weighted 0.7) are
//! only considered when no primary keyword scored 0.8 or more.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::normalize::Normalizer;

/// Category returned when nothing in the taxonomy matched
pub const OTHER_CATEGORY: &str = "other";

/// Subcategory returned when there is nothing better to say
pub const GENERAL_SUBCATEGORY: &str = "general";

const PRIMARY_TIER: &str = "primary";
const SECONDARY_TIER: &str = "secondary";
const SECONDARY_WEIGHT: f64 = 0.7;
const PRIMARY_ACCEPT: f64 = 0.8;
const CONFIDENT: f64 = 0.5;

/// Keywords for one taxonomy category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
}

/// Ordered keyword taxonomy; earlier categories win ties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    categories: Vec<CategoryKeywords>,
}

impl Taxonomy {
    pub fn new(categories: Vec<CategoryKeywords>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[CategoryKeywords] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn get(&self, name: &str) -> Option<&CategoryKeywords> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// Result of classifying one product name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    /// Keyword tier ("primary"/"secondary"), or the first meaningful token
    /// when the match was too weak to trust
    pub subcategory: String,
    pub confidence: f64,
}

impl Classification {
    fn unclassified() -> Self {
        Self {
            category: OTHER_CATEGORY.to_string(),
            subcategory: GENERAL_SUBCATEGORY.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_other(&self) -> bool {
        self.category == OTHER_CATEGORY
    }
}

/// Classifier over a taxonomy
#[derive(Debug, Clone)]
pub struct Classifier {
    normalizer: Normalizer,
    taxonomy: Taxonomy,
}

impl Classifier {
    pub fn new(taxonomy: Taxonomy) -> Result<Self> {
        Ok(Self {
            normalizer: Normalizer::new()?,
            taxonomy,
        })
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classify a raw product name
    pub fn classify(&self, raw_name: &str) -> Classification {
        let normalized = self.normalizer.normalize(raw_name);
        self.classify_normalized(&normalized)
    }

    /// Classify an already-normalized name
    pub fn classify_normalized(&self, normalized: &str) -> Classification {
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        let mut best = Classification::unclassified();

        self.scan(&tokens, PRIMARY_TIER, 1.0, &mut best);
        if best.confidence < PRIMARY_ACCEPT {
            self.scan(&tokens, SECONDARY_TIER, SECONDARY_WEIGHT, &mut best);
        }

        if best.confidence < CONFIDENT {
            if let Some(token) = tokens.iter().find(|t| t.chars().count() > 2) {
                best.subcategory = (*token).to_string();
            }
        }
        best
    }

    fn scan(&self, tokens: &[&str], tier: &str, weight: f64, best: &mut Classification) {
        for category in self.taxonomy.categories() {
            let keywords = if tier == PRIMARY_TIER {
                &category.primary
            } else {
                &category.secondary
            };
            for keyword in keywords {
                for token in tokens {
                    let Some(score) = containment_score(token, keyword) else {
                        continue;
                    };
                    let score = score * weight;
                    if score > best.confidence {
                        best.confidence = score;
                        best.category = category.name.clone();
                        best.subcategory = tier.to_string();
                    }
                }
            }
        }
    }
}

fn containment_score(token: &str, keyword: &str) -> Option<f64> {
    if keyword.is_empty() || !(token.contains(keyword) || keyword.contains(token)) {
        return None;
    }
    let keyword_len = keyword.chars().count();
    let token_len = token.chars().count();
    Some(keyword_len as f64 / token_len.max(keyword_len) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupingConfig;

    fn classifier() -> Classifier {
        Classifier::new(GroupingConfig::default().taxonomy).unwrap()
    }

    #[test]
    fn test_primary_match() {
        let c = classifier().classify("Office Chair Blue");
        assert_eq!(c.category, "furniture");
        assert_eq!(c.subcategory, "primary");
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_partial_token_match() {
        // "phone" inside "iphone" scores 5/6
        let c = classifier().classify("Apple iPhone 14 128GB Black");
        assert_eq!(c.category, "electronics");
        assert!((c.confidence - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_secondary_match_is_weighted() {
        let c = classifier().classify("Wireless Keyboard");
        assert_eq!(c.category, "electronics");
        assert_eq!(c.subcategory, "secondary");
        assert!((c.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_food_with_size_tokens() {
        let one = classifier().classify("Flour 1kg");
        let five = classifier().classify("Flour 5kg");
        assert_eq!(one, five);
        assert_eq!(one.category, "food_beverages");
    }

    #[test]
    fn test_unmatched_uses_first_meaningful_token() {
        let c = classifier().classify("Zz Gizmo Widget");
        assert_eq!(c.category, OTHER_CATEGORY);
        assert_eq!(c.subcategory, "gizmo");
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_empty_name_default() {
        let c = classifier().classify("");
        assert_eq!(c, Classification::unclassified());
    }

    #[test]
    fn test_first_category_wins_ties() {
        // "oil" is a primary keyword of both food_beverages and automotive
        let c = classifier().classify("Oil");
        assert_eq!(c.category, "food_beverages");
    }

    #[test]
    fn test_deterministic() {
        let classifier = classifier();
        let first = classifier.classify("Stainless Steel Hammer 16oz");
        for _ in 0..5 {
            assert_eq!(classifier.classify("Stainless Steel Hammer 16oz"), first);
        }
    }

    #[test]
    fn test_empty_taxonomy() {
        let classifier = Classifier::new(Taxonomy::default()).unwrap();
        let c = classifier.classify("Office Chair");
        assert!(c.is_other());
        assert_eq!(c.subcategory, "office");
    }
}
