//! Estimated bulk-purchase savings

/// Savings percentage for a group of `item_count` items
pub fn savings_percent(item_count: usize) -> f64 {
    let n = item_count as f64;
    if item_count >= 10 {
        (10.0 + (n - 10.0) * 0.5).min(25.0)
    } else if item_count >= 5 {
        (5.0 + (n - 5.0)).min(15.0)
    } else {
        (n * 2.0).max(5.0)
    }
}

/// Savings rendered as an integer percent string, e.g. "12%"
pub fn estimated_savings(item_count: usize) -> String {
    format_percent(savings_percent(item_count))
}

/// Average of percent strings such as "12%"; unparseable entries are skipped
pub fn average_savings<'a>(percentages: impl IntoIterator<Item = &'a str>) -> String {
    let values: Vec<f64> = percentages
        .into_iter()
        .filter_map(|p| p.trim().trim_end_matches('%').parse::<f64>().ok())
        .collect();
    if values.is_empty() {
        return format_percent(0.0);
    }
    format_percent(values.iter().sum::<f64>() / values.len() as f64)
}

fn format_percent(pct: f64) -> String {
    format!("{}%", pct.round_ties_even() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_groups() {
        assert_eq!(estimated_savings(0), "5%");
        assert_eq!(estimated_savings(1), "5%");
        assert_eq!(estimated_savings(3), "6%");
        assert_eq!(estimated_savings(4), "8%");
    }

    #[test]
    fn test_medium_groups() {
        assert_eq!(estimated_savings(5), "5%");
        assert_eq!(estimated_savings(9), "9%");
    }

    #[test]
    fn test_large_groups_cap() {
        assert_eq!(estimated_savings(10), "10%");
        assert_eq!(estimated_savings(12), "11%");
        assert_eq!(estimated_savings(40), "25%");
        assert_eq!(estimated_savings(1000), "25%");
    }

    #[test]
    fn test_half_rounds_to_even() {
        // 11 items -> 10.5%
        assert_eq!(estimated_savings(11), "10%");
        // 13 items -> 11.5%
        assert_eq!(estimated_savings(13), "12%");
    }

    #[test]
    fn test_average_savings() {
        assert_eq!(average_savings(["10%", "20%"]), "15%");
        assert_eq!(average_savings(["bogus", "8%"]), "8%");
        assert_eq!(average_savings(Vec::<&str>::new()), "0%");
    }
}
