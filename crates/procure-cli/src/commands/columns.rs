//! Column inspection command

use std::path::Path;

use anyhow::Result;

use super::{load_dataset, truncate};

/// Print each column with its role, distinct-value count and most common values
pub fn cmd_columns(file: &Path, top: usize) -> Result<()> {
    let dataset = load_dataset(file)?;
    let roles = dataset.item_roles();

    println!("{} rows, {} columns\n", dataset.len(), dataset.columns().len());
    println!("{:<4} {:<30} {:<10} {:>8}  TOP VALUES", "#", "COLUMN", "ROLE", "DISTINCT");
    println!("{}", "-".repeat(90));

    for (idx, column) in dataset.columns().iter().enumerate() {
        let role = if idx == roles.name {
            "name"
        } else if Some(idx) == roles.price {
            "price"
        } else if Some(idx) == roles.category {
            "category"
        } else if Some(idx) == roles.quantity {
            "quantity"
        } else {
            ""
        };
        let values = dataset.unique_values(idx);
        let preview = values
            .iter()
            .take(top)
            .map(|v| format!("{} ({})", truncate(&v.value, 20), v.count))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<4} {:<30} {:<10} {:>8}  {}",
            idx,
            truncate(column, 30),
            role,
            values.len(),
            preview
        );
    }
    Ok(())
}
