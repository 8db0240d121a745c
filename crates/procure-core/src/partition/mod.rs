//! Clustering partitioners
//!
//! Each partitioner turns a dataset (or a flat item list) into main groups
//! of sub-groups plus an ungrouped list. None of them validate; the engine
//! runs the validator over whatever they return.

pub mod ai_plan;
pub mod chunked;
pub mod columns;
pub mod greedy;

use std::collections::HashMap;

pub use ai_plan::AiPlanPartitioner;
pub use chunked::ChunkedPartitioner;
pub use columns::{column_groups, single_column_groups, unique_value_groups};
pub use greedy::{cluster_items, Cluster};

/// Sub-group used when a main group is too small to split
pub const DEFAULT_SUB_GROUP: &str = "Default";

/// Sub-group for values an AI sub-group plan did not claim
pub const OTHER_ITEMS_SUB_GROUP: &str = "Other Items";

/// One named bucket of an `OrderedBuckets`
#[derive(Debug, Clone)]
pub(crate) struct Bucket<T> {
    pub name: String,
    pub items: Vec<T>,
}

/// Buckets in first-insertion order, keyed by name
#[derive(Debug, Clone)]
pub(crate) struct OrderedBuckets<T> {
    index: HashMap<String, usize>,
    buckets: Vec<Bucket<T>>,
}

impl<T> OrderedBuckets<T> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &str, item: T) {
        match self.index.get(name) {
            Some(&i) => self.buckets[i].items.push(item),
            None => {
                self.index.insert(name.to_string(), self.buckets.len());
                self.buckets.push(Bucket {
                    name: name.to_string(),
                    items: vec![item],
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Buckets in insertion order
    pub fn into_vec(self) -> Vec<Bucket<T>> {
        self.buckets
    }

    /// Largest bucket first; equal sizes keep insertion order
    pub fn into_by_size(self) -> Vec<Bucket<T>> {
        let mut buckets = self.buckets;
        buckets.sort_by(|a, b| b.items.len().cmp(&a.items.len()));
        buckets
    }
}

impl<T> Default for OrderedBuckets<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_buckets_insertion_order() {
        let mut buckets = OrderedBuckets::new();
        for (name, v) in [("b", 1), ("a", 2), ("b", 3)] {
            buckets.push(name, v);
        }
        assert_eq!(buckets.len(), 2);
        let names: Vec<String> = buckets.clone().into_vec().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_ordered_buckets_by_size_is_stable() {
        let mut buckets = OrderedBuckets::new();
        for name in ["x", "y", "z", "z"] {
            buckets.push(name, ());
        }
        let names: Vec<String> = buckets.into_by_size().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["z", "x", "y"]);
    }
}
