//! Similarity-threshold greedy clustering
//!
//! Seed-and-absorb: the first unassigned item seeds a cluster and absorbs
//! every later unassigned item scoring at least the threshold against it.
//! O(n^2) per window, so inputs are processed in windows of
//! `max_items` and same-named clusters are merged afterwards. Windows are
//! therefore not independent: clusters from different windows that end up
//! with the same name become one bucket.

use tracing::debug;

use crate::config::ClusteringConfig;
use crate::models::Item;
use crate::naming::cluster_name;
use crate::similarity::{score, ItemProfile, SimilarityScorer};

use super::OrderedBuckets;

/// A named set of similar items
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub name: String,
    /// Core type of the seed item
    pub core_type: String,
    pub items: Vec<Item>,
}

/// Cluster `items` at `threshold`.
///
/// With `canonical_order` the items are sorted by (normalized name, row)
/// first, so the result does not depend on input order. Every input item
/// lands in exactly one cluster.
pub fn cluster_items(items: Vec<Item>, scorer: &SimilarityScorer, threshold: f64, config: &ClusteringConfig) -> Vec<Cluster> {
    let mut entries: Vec<(Item, ItemProfile)> = items
        .into_iter()
        .map(|item| {
            let profile = scorer.profile(&item);
            (item, profile)
        })
        .collect();

    if config.canonical_order {
        entries.sort_by(|(a, pa), (b, pb)| {
            pa.normalized
                .cmp(&pb.normalized)
                .then(a.original_index.cmp(&b.original_index))
        });
    }

    let total = entries.len();
    let window = config.max_items.max(1);
    let mut merged: OrderedBuckets<(Item, String)> = OrderedBuckets::new();
    let mut remaining = entries;
    while !remaining.is_empty() {
        let rest = remaining.split_off(remaining.len().min(window));
        for cluster in cluster_window(remaining, threshold, config.max_name_len) {
            let name = cluster.name.clone();
            for item in cluster.items {
                merged.push(&name, (item, cluster.core_type.clone()));
            }
        }
        remaining = rest;
    }

    let clusters: Vec<Cluster> = merged
        .into_vec()
        .into_iter()
        .map(|bucket| {
            let core_type = bucket.items.first().map(|(_, c)| c.clone()).unwrap_or_default();
            Cluster {
                name: bucket.name,
                core_type,
                items: bucket.items.into_iter().map(|(item, _)| item).collect(),
            }
        })
        .collect();
    debug!(items = total, clusters = clusters.len(), threshold, "Greedy clustering done");
    clusters
}

fn cluster_window(entries: Vec<(Item, ItemProfile)>, threshold: f64, max_name_len: usize) -> Vec<Cluster> {
    let n = entries.len();
    let mut assigned = vec![false; n];
    let mut member_lists: Vec<Vec<usize>> = Vec::new();

    for seed in 0..n {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];
        for candidate in seed + 1..n {
            if !assigned[candidate] && score(&entries[seed].1, &entries[candidate].1) >= threshold {
                assigned[candidate] = true;
                members.push(candidate);
            }
        }
        member_lists.push(members);
    }

    let mut slots: Vec<Option<(Item, ItemProfile)>> = entries.into_iter().map(Some).collect();
    let mut clusters = Vec::with_capacity(member_lists.len());
    for members in member_lists {
        let (items, profiles): (Vec<Item>, Vec<ItemProfile>) = members
            .into_iter()
            .filter_map(|i| slots[i].take())
            .unzip();
        let Some(seed) = profiles.first() else {
            continue;
        };
        let core_type = seed.classification.category.clone();
        let name = cluster_name(&items, &profiles, &core_type, &seed.classification.subcategory, max_name_len);
        clusters.push(Cluster { name, core_type, items });
    }
    clusters
}
