//! Tabular input for the grouping engine
//!
//! This module is the only place raw cell text is turned into numbers.
//! Everything downstream sees plain `f64`/`u32`/`String` values.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Item, DEFAULT_CATEGORY};

/// Cell texts read as missing values
pub const NULL_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const PRICE_KEYWORDS: &[&str] = &["price", "cost", "amount", "value", "rate"];
const CATEGORY_KEYWORDS: &[&str] = &["category", "type", "class", "group", "dept"];
const QUANTITY_KEYWORDS: &[&str] = &["quantity", "qty", "count", "number", "stock"];

/// Rows inspected when guessing a column's role from its contents
const ROLE_SAMPLE_ROWS: usize = 100;
/// Columns (after the first) inspected when guessing a role from contents
const ROLE_SCAN_COLUMNS: usize = 5;
const ROLE_MAJORITY: f64 = 0.7;

/// A distinct column value and the number of rows carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Column positions used to project rows into items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub name: usize,
    pub price: Option<usize>,
    pub category: Option<usize>,
    pub quantity: Option<usize>,
}

/// Ordered rows under named columns; missing cells are `None`
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    /// Build a dataset; short rows are padded with missing cells, long rows truncated
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::NoColumns);
        }
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row.into_iter().map(|cell| cell.and_then(clean_cell)).collect()
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Build a dataset from string cells, applying the null markers
    pub fn from_strings(columns: &[&str], rows: &[Vec<&str>]) -> Result<Self> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
                .collect(),
        )
    }

    /// Read CSV with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(Error::NoColumns);
        }

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(|cell| Some(cell.to_string())).collect());
        }
        debug!(rows = rows.len(), columns = columns.len(), "Loaded CSV dataset");
        Self::new(columns, rows)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fail with `EmptyDataset` when there are no rows
    pub fn ensure_rows(&self) -> Result<()> {
        if self.rows.is_empty() {
            return Err(Error::EmptyDataset);
        }
        Ok(())
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Trimmed cell text, `None` when missing or blank
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Column name -> cell text for one row; missing cells become ""
    pub fn row_data(&self, row: usize) -> BTreeMap<String, String> {
        let Some(cells) = self.rows.get(row) else {
            return BTreeMap::new();
        };
        self.columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| (column.clone(), cell.clone().unwrap_or_default()))
            .collect()
    }

    /// Distinct non-blank values of a column, most frequent first; ties keep first appearance
    pub fn unique_values(&self, column: usize) -> Vec<ValueCount> {
        let mut counts = self.values_in_order(column);
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }

    /// Distinct non-blank values of a column in first-appearance order
    pub fn values_in_order(&self, column: usize) -> Vec<ValueCount> {
        self.value_counts((0..self.len()).filter_map(|row| self.cell(row, column)))
    }

    /// Distinct non-blank values of a column among `rows`, in first-appearance order
    pub fn values_in_rows(&self, column: usize, rows: &[usize]) -> Vec<ValueCount> {
        self.value_counts(rows.iter().filter_map(|&row| self.cell(row, column)))
    }

    fn value_counts<'a>(&self, values: impl Iterator<Item = &'a str>) -> Vec<ValueCount> {
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        let mut counts: Vec<ValueCount> = Vec::new();
        for value in values {
            match index.get(value) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(value, counts.len());
                    counts.push(ValueCount {
                        value: value.to_string(),
                        count: 1,
                    });
                }
            }
        }
        counts
    }

    /// Guess which columns hold the name, price, category and quantity
    pub fn detect_roles(&self) -> ColumnRoles {
        let price = self
            .column_with_keyword(PRICE_KEYWORDS)
            .or_else(|| self.column_by_content(is_numeric));
        let category = self
            .column_with_keyword(CATEGORY_KEYWORDS)
            .or_else(|| self.column_by_content(|v| !is_numeric(v)));
        let quantity = self.column_with_keyword(QUANTITY_KEYWORDS);
        debug!(?price, ?category, ?quantity, "Detected column roles");
        ColumnRoles {
            name: 0,
            price,
            category,
            quantity,
        }
    }

    /// Positional roles: name, price, category, quantity in columns 0..4
    pub fn positional_roles(&self) -> ColumnRoles {
        let at = |i: usize| (i < self.columns.len()).then_some(i);
        ColumnRoles {
            name: 0,
            price: at(1),
            category: at(2),
            quantity: at(3),
        }
    }

    /// Detected roles with positional fallbacks for anything undetected
    pub fn item_roles(&self) -> ColumnRoles {
        let detected = self.detect_roles();
        let positional = self.positional_roles();
        ColumnRoles {
            name: 0,
            price: detected.price.or(positional.price),
            category: detected.category.or(positional.category),
            quantity: detected.quantity.or(positional.quantity),
        }
    }

    fn column_with_keyword(&self, keywords: &[&str]) -> Option<usize> {
        self.columns.iter().position(|c| {
            let lower = c.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
    }

    fn column_by_content(&self, predicate: impl Fn(&str) -> bool) -> Option<usize> {
        let end = self.columns.len().min(ROLE_SCAN_COLUMNS);
        (1..end).find(|&column| {
            let sample: Vec<&str> = (0..self.len().min(ROLE_SAMPLE_ROWS))
                .filter_map(|row| self.cell(row, column))
                .collect();
            if sample.is_empty() {
                return false;
            }
            let hits = sample.iter().filter(|v| predicate(v)).count();
            hits as f64 / sample.len() as f64 > ROLE_MAJORITY
        })
    }

    /// Project a row into an item using column roles; the name falls back to `Item_<row>`
    pub fn project_item(&self, row: usize, roles: &ColumnRoles) -> Item {
        let name = self
            .cell(row, roles.name)
            .map(str::to_string)
            .unwrap_or_else(|| Item::placeholder_name(row));
        let category = roles
            .category
            .and_then(|c| self.cell(row, c))
            .unwrap_or(DEFAULT_CATEGORY);
        self.build_item(row, name, category, roles)
    }

    /// Build an item for `row` with an explicit name and category
    pub fn build_item(&self, row: usize, name: impl Into<String>, category: &str, roles: &ColumnRoles) -> Item {
        let mut item = Item::new(row, name)
            .with_category(category)
            .with_price(parse_price(roles.price.and_then(|c| self.cell(row, c))))
            .with_quantity(parse_quantity(roles.quantity.and_then(|c| self.cell(row, c))));
        item.row_data = self.row_data(row);
        item
    }
}

fn clean_cell(cell: String) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(cell)
    }
}

fn is_numeric(value: &str) -> bool {
    value.replace([',', '$'], "").trim().parse::<f64>().is_ok()
}

/// Parse a price cell; "$1,299.00" -> 1299.0. Missing, invalid or negative -> 0.0
pub fn parse_price(cell: Option<&str>) -> f64 {
    cell.and_then(|c| c.replace([',', '$'], "").trim().parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p >= 0.0)
        .unwrap_or(0.0)
}

/// Parse a quantity cell; "2.0" -> 2, "1,200" -> 1200. Missing, invalid or < 1 -> 1
pub fn parse_quantity(cell: Option<&str>) -> u32 {
    cell.and_then(|c| c.replace(',', "").trim().parse::<f64>().ok())
        .filter(|q| q.is_finite() && *q >= 1.0)
        .map(|q| q.trunc().min(u32::MAX as f64) as u32)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let csv = "Name,Price,Category,Qty\n\
                   Office Chair,\"$1,299.00\",Furniture,2\n\
                   Desk Lamp,49,Furniture,\n\
                   Rice 1kg,5,Food,3.7\n\
                   ,n/a,NA,x\n";
        Dataset::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_from_reader() {
        let ds = sample();
        assert_eq!(ds.columns(), &["Name", "Price", "Category", "Qty"]);
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.cell(0, 0), Some("Office Chair"));
        assert_eq!(ds.cell(3, 0), None);
        assert_eq!(ds.cell(3, 2), None);
    }

    #[test]
    fn test_short_rows_padded() {
        let ds = Dataset::from_reader("a,b,c\n1\n1,2,3,4\n".as_bytes()).unwrap();
        assert_eq!(ds.cell(0, 2), None);
        assert_eq!(ds.cell(1, 2), Some("3"));
        assert_eq!(ds.row_data(1).len(), 3);
    }

    #[test]
    fn test_no_columns() {
        assert!(matches!(Dataset::new(vec![], vec![]), Err(Error::NoColumns)));
        assert!(matches!(Dataset::from_reader("".as_bytes()), Err(Error::NoColumns)));
    }

    #[test]
    fn test_column_index() {
        let ds = sample();
        assert_eq!(ds.column_index("Category").unwrap(), 2);
        assert!(matches!(ds.column_index("Nope"), Err(Error::ColumnNotFound(_))));
    }

    #[test]
    fn test_unique_values_order() {
        let ds = Dataset::from_strings(
            &["Category"],
            &[vec!["Food"], vec!["Furniture"], vec![" Furniture "], vec!["Food"], vec!["Tools"], vec![""]],
        )
        .unwrap();
        let values: Vec<(String, usize)> = ds.unique_values(0).into_iter().map(|v| (v.value, v.count)).collect();
        assert_eq!(
            values,
            vec![("Food".into(), 2), ("Furniture".into(), 2), ("Tools".into(), 1)]
        );
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(Some("$1,299.00")), 1299.0);
        assert_eq!(parse_price(Some("abc")), 0.0);
        assert_eq!(parse_price(Some("-5")), 0.0);
        assert_eq!(parse_price(None), 0.0);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(Some("3.7")), 3);
        assert_eq!(parse_quantity(Some("1,200")), 1200);
        assert_eq!(parse_quantity(Some("0")), 1);
        assert_eq!(parse_quantity(Some("x")), 1);
        assert_eq!(parse_quantity(None), 1);
    }

    #[test]
    fn test_detect_roles_by_keyword() {
        let roles = sample().detect_roles();
        assert_eq!(roles.price, Some(1));
        assert_eq!(roles.category, Some(2));
        assert_eq!(roles.quantity, Some(3));
    }

    #[test]
    fn test_detect_roles_by_content() {
        let ds = Dataset::from_strings(
            &["Item", "A", "B"],
            &[vec!["Pen", "1.50", "Office"], vec!["Chair", "99", "Furniture"], vec!["Rice", "5", "Food"]],
        )
        .unwrap();
        let roles = ds.detect_roles();
        assert_eq!(roles.price, Some(1));
        assert_eq!(roles.category, Some(2));
        assert_eq!(roles.quantity, None);
    }

    #[test]
    fn test_project_item_defaults() {
        let ds = sample();
        let roles = ds.item_roles();
        let item = ds.project_item(3, &roles);
        assert_eq!(item.name, "Item_3");
        assert_eq!(item.category, DEFAULT_CATEGORY);
        assert_eq!(item.price, 0.0);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.row_data["Price"], "");

        let chair = ds.project_item(0, &roles);
        assert_eq!(chair.price, 1299.0);
        assert_eq!(chair.quantity, 2);
        assert_eq!(chair.category, "Furniture");
        assert_eq!(chair.id, "0");
    }
}
