//! AI backend check

use std::path::Path;

use anyhow::Result;
use procure_core::{AIBackend, AIClient, PlanRequest, RequestOptions, ValueCount};

use super::load_config;

fn sample_values() -> Vec<ValueCount> {
    [("Office Supplies", 12), ("Stationery", 8), ("Office Furniture", 5), ("Furniture", 3)]
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect()
}

/// Check the configured backend and ask it for a small sample plan
pub async fn cmd_oracle_test(config: Option<&Path>) -> Result<()> {
    let Some(client) = AIClient::from_env() else {
        println!("No AI backend configured.");
        println!();
        println!("Set one of:");
        println!("  AI_BACKEND=ollama OLLAMA_HOST=http://localhost:11434 [OLLAMA_MODEL=llama3.2]");
        println!("  AI_BACKEND=openai_compatible OPENAI_COMPATIBLE_HOST=... [OPENAI_COMPATIBLE_API_KEY=...]");
        println!("  AI_BACKEND=mock");
        return Ok(());
    };
    let config = load_config(config)?;
    let client = client.with_options(RequestOptions::from(&config.oracle));

    println!("Backend: {}", client.backend_name());
    println!("Host:    {}", client.host());
    println!("Model:   {}", client.model());

    if !client.health_check().await {
        println!("Health:  unreachable");
        return Ok(());
    }
    println!("Health:  ok");

    let request = PlanRequest::new("Department", "Department", sample_values());
    match client.request_grouping_plan(&request).await {
        Ok(plan) => {
            println!();
            println!("Sample plan:");
            for (group, mapping) in &plan.main_group_mappings {
                println!("  {} <- {}", group, mapping.original_values.join(", "));
            }
        }
        Err(e) => println!("Sample plan failed: {}", e),
    }
    Ok(())
}
