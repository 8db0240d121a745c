//! Effective configuration display

use std::path::Path;

use anyhow::Result;
use procure_core::config::default_config_path;

use super::load_config;

pub fn cmd_config(path: Option<&Path>) -> Result<()> {
    let default_path = default_config_path();
    let source = match (path, &default_path) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(default)) if default.exists() => default.display().to_string(),
        (None, _) => "embedded defaults".to_string(),
    };
    let config = load_config(path)?;

    println!("Config source: {}", source);
    println!(
        "Override path: {}",
        default_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );

    let chunked = &config.chunked;
    println!();
    println!("[chunked]");
    println!("  chunk_size          = {}", chunked.chunk_size);
    println!("  sample_size         = {}", chunked.sample_size);
    println!("  min_confidence      = {}", chunked.min_confidence);
    println!("  min_group_size      = {}", chunked.min_group_size);
    println!("  sub_group_threshold = {}", chunked.sub_group_threshold);
    println!("  assign_remaining    = {}", chunked.assign_remaining);

    let clustering = &config.clustering;
    println!();
    println!("[clustering]");
    println!("  canonical_order     = {}", clustering.canonical_order);
    println!("  max_items           = {}", clustering.max_items);
    println!("  fallback_threshold  = {}", clustering.fallback_threshold);

    let oracle = &config.oracle;
    println!();
    println!("[oracle]");
    println!("  timeout             = {}s", oracle.timeout.as_secs());
    println!("  max_main_values     = {}", oracle.max_main_values);
    println!("  max_sub_values      = {}", oracle.max_sub_values);
    println!("  match_threshold     = {}", oracle.match_threshold);
    println!("  temperature         = {}", oracle.temperature);
    println!("  max_tokens          = {}", oracle.max_tokens);

    println!();
    println!("[taxonomy]");
    for category in config.taxonomy.categories() {
        println!(
            "  {:<20} {} primary, {} secondary keywords",
            category.name,
            category.primary.len(),
            category.secondary.len()
        );
    }

    Ok(())
}
