//! Product name normalization
//!
//! Reduces a raw product name to the words that identify what the product
//! is, dropping brands, model codes, colors, sizes and units. Patterns are
//! applied in a fixed order:
//! 1. brand / legal suffix / model / version / generation tokens
//! 2. color compounds ("dark blue"), then bare colors
//! 3. weights, volumes, lengths, pack counts, qualitative sizes, dimensions
//! 4. punctuation to spaces, whitespace collapsed
//!
//! The pass is repeated until the output stops changing, so normalizing an
//! already-normalized name returns it unchanged.

use regex::Regex;

use crate::error::Result;

const BRAND_PATTERNS: &[&str] = &[
    r"\b(apple|samsung|dell|hp|lenovo|asus|acer|sony|lg|canon|epson|nike|adidas|microsoft|google|intel|amd)\b",
    r"\b(inc\.?|corp\.?|ltd\.?|llc|co\.?|company)\b",
    r"\bmodel\s*[a-z0-9\-]+\b",
    // Model numbers like abc123, x1000
    r"\b[a-z]*\d{3,}\b",
    r"\bv\d+(\.\d+)?\b",
    r"\b(gen|generation)\s*\d+\b",
];

const COLOR_PATTERNS: &[&str] = &[
    r"\b(dark|light|bright)\s+(red|blue|green|yellow|orange|purple|pink|black|white|grey|gray|brown)\b",
    r"\b(red|blue|green|yellow|orange|purple|pink|black|white|grey|gray|brown|silver|gold|bronze)\b",
];

const SIZE_PATTERNS: &[&str] = &[
    r"\b\d+\.?\d*\s*(kg|g|lb|oz|pound|gram|kilogram|ton)\b",
    r"\b\d+\.?\d*\s*(ml|l|liter|litre|fl\s*oz|gallon|cup|pint|quart)\b",
    r"\b\d+\.?\d*\s*(mm|cm|m|meter|metre|inch|in|ft|foot|feet|yard)\b",
    r"\b\d+\.?\d*\s*(pack|pcs|pieces|count|ct|box|bottle|can|bag)\b",
    r"\b(small|medium|large|xl|xxl|xs|mini|micro|mega|super|extra)\b",
    // Dimensions: 10 x 20 x 5
    r#"\b\d+["']?\s*x\s*\d+["']?\s*x?\s*\d*["']?\b"#,
    r"\b\d+\s*(size|count|piece)\b",
];

/// Hard stop for the fixed-point loop; every pass after the first strictly shortens the text
const MAX_PASSES: usize = 16;

/// Compiled normalization patterns
#[derive(Debug, Clone)]
pub struct Normalizer {
    brand: Vec<Regex>,
    color: Vec<Regex>,
    size: Vec<Regex>,
    punctuation: Regex,
    whitespace: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            brand: compile(BRAND_PATTERNS)?,
            color: compile(COLOR_PATTERNS)?,
            size: compile(SIZE_PATTERNS)?,
            punctuation: Regex::new(r"[^\w\s]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Normalize a raw product name into a lowercase bag-of-words string.
    ///
    /// May return an empty string when the input is nothing but noise.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = self.pass(raw);
        for _ in 0..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Normalized tokens of `raw`
    pub fn tokens(&self, raw: &str) -> Vec<String> {
        self.normalize(raw)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    fn pass(&self, input: &str) -> String {
        let mut text = input.trim().to_lowercase();
        for pattern in self.brand.iter().chain(&self.color).chain(&self.size) {
            if pattern.is_match(&text) {
                text = pattern.replace_all(&text, "").into_owned();
            }
        }
        let text = self.punctuation.replace_all(&text, " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new().unwrap()
    }

    #[test]
    fn test_strips_brand_and_color() {
        let n = normalizer();
        assert_eq!(n.normalize("Apple iPhone 14 128GB Black"), "iphone 14 128gb");
        assert_eq!(n.normalize("Office Chair Blue"), "office chair");
    }

    #[test]
    fn test_strips_sizes_and_units() {
        let n = normalizer();
        assert_eq!(n.normalize("Rice 1kg"), "rice");
        assert_eq!(n.normalize("Flour 5 kg"), "flour");
        assert_eq!(n.normalize("Olive Oil 500ml Bottle"), "olive oil bottle");
        assert_eq!(n.normalize("Paper Towels 12 Pack"), "paper towels");
        assert_eq!(n.normalize("Large Storage Box"), "storage box");
    }

    #[test]
    fn test_strips_model_codes() {
        let n = normalizer();
        assert_eq!(n.normalize("Router AX3000 v2.1"), "router");
        assert_eq!(n.normalize("Thermostat Gen 3"), "thermostat");
        assert_eq!(n.normalize("Acme Inc. Stapler"), "acme stapler");
    }

    #[test]
    fn test_compound_color() {
        let n = normalizer();
        assert_eq!(n.normalize("Dark Blue Pen"), "pen");
    }

    #[test]
    fn test_dimensions() {
        let n = normalizer();
        assert_eq!(n.normalize("Shelf 30 x 60 x 10"), "shelf");
    }

    #[test]
    fn test_punctuation_and_whitespace() {
        let n = normalizer();
        assert_eq!(n.normalize("  Desk-Lamp,   (LED)  "), "desk lamp led");
    }

    #[test]
    fn test_all_noise_normalizes_to_empty() {
        let n = normalizer();
        assert_eq!(n.normalize("Black 2kg"), "");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn test_idempotent() {
        let n = normalizer();
        let samples = [
            "Model: Chair",
            "Apple iPhone 14 128GB Black",
            "HP-LaserJet Pro (M404n)",
            "Gen-2 Screwdriver Set",
            "Light-Blue Cotton Shirt XL",
            "Samsung Phone S23",
            "  ",
            "5 x 5 Tiles",
        ];
        for sample in samples {
            let once = n.normalize(sample);
            assert_eq!(n.normalize(&once), once, "not stable for {:?}", sample);
        }
    }

    #[test]
    fn test_tokens() {
        let n = normalizer();
        assert_eq!(n.tokens("Office Chair Blue"), vec!["office", "chair"]);
    }
}
