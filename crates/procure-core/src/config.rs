//! Grouping configuration
//!
//! Configuration is resolved in two layers:
//! 1. Embedded default (config/grouping.toml, compiled into binary)
//! 2. Optional override (~/.local/share/procure/config/grouping.toml)
//!
//! The override only needs to name the keys it changes. A `[[taxonomy]]`
//! list in the override replaces the whole default taxonomy.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::classify::{CategoryKeywords, Taxonomy};
use crate::error::{Error, Result};

/// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("../../../config/grouping.toml");

/// Chunked frequency analysis settings
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedConfig {
    pub chunk_size: usize,
    pub sample_size: usize,
    pub min_confidence: f64,
    pub min_group_size: usize,
    /// Below this many sampled rows every classified core type is promoted
    pub small_sample_rows: usize,
    pub sub_group_threshold: f64,
    pub single_sub_group_max: usize,
    pub chunk_top_words: usize,
    pub global_top_words: usize,
    pub assign_remaining: bool,
}

impl Default for ChunkedConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            sample_size: 100,
            min_confidence: 0.3,
            min_group_size: 3,
            small_sample_rows: 20,
            sub_group_threshold: 0.7,
            single_sub_group_max: 3,
            chunk_top_words: 20,
            global_top_words: 30,
            assign_remaining: false,
        }
    }
}

/// Greedy clustering settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub canonical_order: bool,
    pub max_items: usize,
    pub similarity_scan_cap: usize,
    pub fallback_threshold: f64,
    pub sub_group_assign_threshold: f64,
    pub group_assign_threshold: f64,
    pub max_name_len: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            canonical_order: true,
            max_items: 2000,
            similarity_scan_cap: 5,
            fallback_threshold: 0.5,
            sub_group_assign_threshold: 0.5,
            group_assign_threshold: 0.4,
            max_name_len: 50,
        }
    }
}

/// AI-plan grouping settings
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub timeout: Duration,
    pub max_main_values: usize,
    pub max_sub_values: usize,
    pub max_sub_plan_values: usize,
    pub match_threshold: f64,
    pub substring_score: f64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub value_based_limit: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_main_values: 50,
            max_sub_values: 100,
            max_sub_plan_values: 75,
            match_threshold: 0.6,
            substring_score: 0.8,
            temperature: 0.3,
            max_tokens: 3000,
            value_based_limit: 10,
        }
    }
}

/// Complete grouping configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingConfig {
    pub chunked: ChunkedConfig,
    pub clustering: ClusteringConfig,
    pub oracle: OracleConfig,
    pub taxonomy: Taxonomy,
}

impl GroupingConfig {
    /// Load from the default override location, falling back to the embedded default
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::embedded(),
        }
    }

    /// Load an override file on top of the embedded default
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG, Self::builtin())
    }

    /// Apply TOML `content` on top of the embedded default
    pub fn from_toml(content: &str) -> Result<Self> {
        let base = Self::embedded()?;
        parse_config(content, base)
    }

    /// Numeric defaults with an empty taxonomy
    fn builtin() -> Self {
        Self {
            chunked: ChunkedConfig::default(),
            clustering: ClusteringConfig::default(),
            oracle: OracleConfig::default(),
            taxonomy: Taxonomy::default(),
        }
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.chunked.chunk_size == 0 {
            return Err(Error::Config("chunked.chunk_size must be positive".into()));
        }
        if self.chunked.sample_size == 0 {
            return Err(Error::Config("chunked.sample_size must be positive".into()));
        }
        if self.clustering.max_items == 0 {
            return Err(Error::Config("clustering.max_items must be positive".into()));
        }
        let thresholds = [
            ("chunked.min_confidence", self.chunked.min_confidence),
            ("chunked.sub_group_threshold", self.chunked.sub_group_threshold),
            ("clustering.fallback_threshold", self.clustering.fallback_threshold),
            ("clustering.sub_group_assign_threshold", self.clustering.sub_group_assign_threshold),
            ("clustering.group_assign_threshold", self.clustering.group_assign_threshold),
            ("oracle.match_threshold", self.oracle.match_threshold),
            ("oracle.substring_score", self.oracle.substring_score),
        ];
        for (key, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within [0, 1], got {}", key, value)));
            }
        }
        for category in self.taxonomy.categories() {
            if category.name.trim().is_empty() {
                return Err(Error::Config("taxonomy category with empty name".into()));
            }
        }
        Ok(())
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self::embedded().unwrap_or_else(|_| Self::builtin())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("procure").join("config").join("grouping.toml"))
}

/// The embedded default configuration text
pub fn embedded_config() -> &'static str {
    DEFAULT_CONFIG
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    chunked: Option<RawChunked>,
    clustering: Option<RawClustering>,
    oracle: Option<RawOracle>,
    taxonomy: Option<Vec<CategoryKeywords>>,
}

#[derive(Debug, Deserialize)]
struct RawChunked {
    chunk_size: Option<usize>,
    sample_size: Option<usize>,
    min_confidence: Option<f64>,
    min_group_size: Option<usize>,
    small_sample_rows: Option<usize>,
    sub_group_threshold: Option<f64>,
    single_sub_group_max: Option<usize>,
    chunk_top_words: Option<usize>,
    global_top_words: Option<usize>,
    assign_remaining: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawClustering {
    canonical_order: Option<bool>,
    max_items: Option<usize>,
    similarity_scan_cap: Option<usize>,
    fallback_threshold: Option<f64>,
    sub_group_assign_threshold: Option<f64>,
    group_assign_threshold: Option<f64>,
    max_name_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawOracle {
    timeout_secs: Option<u64>,
    max_main_values: Option<usize>,
    max_sub_values: Option<usize>,
    max_sub_plan_values: Option<usize>,
    match_threshold: Option<f64>,
    substring_score: Option<f64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    value_based_limit: Option<usize>,
}

/// Parse TOML `content` and apply it over `config`
fn parse_config(content: &str, mut config: GroupingConfig) -> Result<GroupingConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    if let Some(chunked) = raw.chunked {
        let c = &mut config.chunked;
        set(&mut c.chunk_size, chunked.chunk_size);
        set(&mut c.sample_size, chunked.sample_size);
        set(&mut c.min_confidence, chunked.min_confidence);
        set(&mut c.min_group_size, chunked.min_group_size);
        set(&mut c.small_sample_rows, chunked.small_sample_rows);
        set(&mut c.sub_group_threshold, chunked.sub_group_threshold);
        set(&mut c.single_sub_group_max, chunked.single_sub_group_max);
        set(&mut c.chunk_top_words, chunked.chunk_top_words);
        set(&mut c.global_top_words, chunked.global_top_words);
        set(&mut c.assign_remaining, chunked.assign_remaining);
    }

    if let Some(clustering) = raw.clustering {
        let c = &mut config.clustering;
        set(&mut c.canonical_order, clustering.canonical_order);
        set(&mut c.max_items, clustering.max_items);
        set(&mut c.similarity_scan_cap, clustering.similarity_scan_cap);
        set(&mut c.fallback_threshold, clustering.fallback_threshold);
        set(&mut c.sub_group_assign_threshold, clustering.sub_group_assign_threshold);
        set(&mut c.group_assign_threshold, clustering.group_assign_threshold);
        set(&mut c.max_name_len, clustering.max_name_len);
    }

    if let Some(oracle) = raw.oracle {
        let o = &mut config.oracle;
        if let Some(secs) = oracle.timeout_secs {
            o.timeout = Duration::from_secs(secs);
        }
        set(&mut o.max_main_values, oracle.max_main_values);
        set(&mut o.max_sub_values, oracle.max_sub_values);
        set(&mut o.max_sub_plan_values, oracle.max_sub_plan_values);
        set(&mut o.match_threshold, oracle.match_threshold);
        set(&mut o.substring_score, oracle.substring_score);
        set(&mut o.temperature, oracle.temperature);
        set(&mut o.max_tokens, oracle.max_tokens);
        set(&mut o.value_based_limit, oracle.value_based_limit);
    }

    if let Some(taxonomy) = raw.taxonomy {
        config.taxonomy = Taxonomy::new(taxonomy);
    }

    config.validate()?;
    Ok(config)
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
