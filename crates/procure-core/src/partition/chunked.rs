//! Chunked frequency analysis
//!
//! Rows are split into fixed-size chunks and a sample of each chunk is
//! classified. Core types with enough confident members become main groups,
//! split into sub-groups by greedy clustering. When fewer than
//! `small_sample_rows` rows were sampled, a single confident member is
//! enough to promote a core type. Only sampled rows are grouped
//! unless `assign_remaining` is set, in which case every other row is routed
//! to its nearest group.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::config::{ChunkedConfig, ClusteringConfig, GroupingConfig};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::models::{
    Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, ProcessingMethod, SubGroupOrigin, UNGROUPED_SUB_GROUP,
};
use crate::naming::{core_type_display, most_common, tally};
use crate::similarity::{average_similarity, ItemProfile, SimilarityScorer};

use super::greedy::cluster_items;
use super::{Bucket, OrderedBuckets, DEFAULT_SUB_GROUP};

type Classified = (Item, ItemProfile);

pub struct ChunkedPartitioner<'a> {
    scorer: &'a SimilarityScorer,
    chunked: &'a ChunkedConfig,
    clustering: &'a ClusteringConfig,
}

impl<'a> ChunkedPartitioner<'a> {
    pub fn new(scorer: &'a SimilarityScorer, config: &'a GroupingConfig) -> Self {
        Self {
            scorer,
            chunked: &config.chunked,
            clustering: &config.clustering,
        }
    }

    pub fn partition(&self, dataset: &Dataset) -> Result<GroupingResult> {
        dataset.ensure_rows()?;
        let roles = dataset.item_roles();
        let total = dataset.len();
        let chunk_size = self.chunked.chunk_size.max(1);

        let mut sampled = vec![false; total];
        let mut by_type: OrderedBuckets<Classified> = OrderedBuckets::new();
        let mut leftovers: Vec<Classified> = Vec::new();
        let mut global_words: Vec<(String, usize)> = Vec::new();
        let mut total_chunks = 0;
        let mut sampled_rows = 0;

        for start in (0..total).step_by(chunk_size) {
            let end = (start + chunk_size).min(total);
            total_chunks += 1;

            let mut chunk_words: Vec<(String, usize)> = Vec::new();
            for row in sample_rows(start, end, self.chunked.sample_size) {
                sampled[row] = true;
                sampled_rows += 1;

                let mut item = dataset.project_item(row, &roles);
                let profile = self.scorer.annotate(&mut item);
                for word in profile.normalized.split_whitespace().filter(|w| w.chars().count() > 2) {
                    tally(&mut chunk_words, word.to_string(), 1);
                }
                if self.is_confident(&profile) {
                    let core_type = profile.classification.category.clone();
                    by_type.push(&core_type, (item, profile));
                } else {
                    leftovers.push((item, profile));
                }
            }

            for (word, count) in most_common(chunk_words, self.chunked.chunk_top_words) {
                tally(&mut global_words, word, count);
            }
            debug!(chunk = total_chunks, rows = end - start, "Analyzed chunk");
        }

        let min_size = if sampled_rows < self.chunked.small_sample_rows {
            1
        } else {
            self.chunked.min_group_size
        };
        let (mut promoted, demoted): (Vec<Bucket<Classified>>, Vec<Bucket<Classified>>) =
            by_type.into_vec().into_iter().partition(|b| b.items.len() >= min_size);
        promoted.sort_by(|a, b| {
            b.items
                .len()
                .cmp(&a.items.len())
                .then(avg_confidence(&b.items).partial_cmp(&avg_confidence(&a.items)).unwrap_or(Ordering::Equal))
        });
        leftovers.extend(demoted.into_iter().flat_map(|b| b.items));

        let mut groups: Vec<MainGroup> = promoted
            .into_iter()
            .enumerate()
            .map(|(ordinal, bucket)| self.build_group(ordinal, bucket))
            .collect();

        let mut ungrouped: Vec<Item> = Vec::new();
        if self.chunked.assign_remaining {
            let snapshots: Vec<GroupSnapshot> = groups.iter().map(|g| self.snapshot(g)).collect();
            let unsampled = (0..total).filter(|&row| !sampled[row]).map(|row| {
                let mut item = dataset.project_item(row, &roles);
                let profile = self.scorer.annotate(&mut item);
                (item, profile)
            });
            for (item, profile) in leftovers.into_iter().chain(unsampled) {
                if let Some(item) = self.assign(&mut groups, &snapshots, item, &profile) {
                    ungrouped.push(item);
                }
            }
        } else {
            ungrouped.extend(leftovers.into_iter().map(|(item, _)| item));
            ungrouped.extend(
                (0..total)
                    .filter(|&row| !sampled[row])
                    .map(|row| dataset.project_item(row, &roles)),
            );
        }
        ungrouped.sort_by_key(|item| item.original_index);

        for group in &mut groups {
            group.refresh_totals();
        }

        let coverage = if self.chunked.assign_remaining || sampled_rows == total {
            Coverage::Complete
        } else {
            Coverage::Sampled
        };
        let mut metadata = GroupingMetadata::new(ProcessingMethod::ChunkedAnalysis, total);
        metadata.total_chunks = total_chunks;
        metadata.sampled_rows = sampled_rows;
        metadata.pattern_keywords = most_common(global_words, self.chunked.global_top_words)
            .into_iter()
            .map(|(word, _)| word)
            .collect();

        info!(
            rows = total,
            chunks = total_chunks,
            sampled = sampled_rows,
            groups = groups.len(),
            ungrouped = ungrouped.len(),
            "Chunked analysis complete"
        );
        Ok(GroupingResult::new(groups, ungrouped, coverage, metadata))
    }

    fn is_confident(&self, profile: &ItemProfile) -> bool {
        !profile.classification.is_other() && profile.classification.confidence > self.chunked.min_confidence
    }

    fn build_group(&self, ordinal: usize, bucket: Bucket<Classified>) -> MainGroup {
        let avg = avg_confidence(&bucket.items);
        let mut group = MainGroup::new(ordinal, core_type_display(&bucket.name)).with_core_type(bucket.name.clone());
        group.avg_confidence = Some(avg);

        let items: Vec<Item> = bucket.items.into_iter().map(|(item, _)| item).collect();
        if items.len() <= self.chunked.single_sub_group_max {
            group.push_sub_group(DEFAULT_SUB_GROUP, SubGroupOrigin::Default, items);
        } else {
            for cluster in cluster_items(items, self.scorer, self.chunked.sub_group_threshold, self.clustering) {
                group.push_sub_group(cluster.name, SubGroupOrigin::Cluster, cluster.items);
            }
        }
        group.refresh_totals();
        group
    }

    /// Profiles of the first few members of each sub-group, taken before any routing
    fn snapshot(&self, group: &MainGroup) -> GroupSnapshot {
        let cap = self.clustering.similarity_scan_cap;
        let sub_groups: Vec<Vec<ItemProfile>> = group
            .sub_groups
            .iter()
            .map(|s| s.items.iter().take(cap).map(|i| self.scorer.profile(i)).collect())
            .collect();
        let members = sub_groups.iter().flatten().take(cap).cloned().collect();
        GroupSnapshot { sub_groups, members }
    }

    /// Route an item into the groups; gives it back when no group is close enough
    fn assign(&self, groups: &mut [MainGroup], snapshots: &[GroupSnapshot], item: Item, profile: &ItemProfile) -> Option<Item> {
        let cap = self.clustering.similarity_scan_cap;
        let by_type = if self.is_confident(profile) {
            groups
                .iter()
                .position(|g| g.core_type.as_deref() == Some(profile.classification.category.as_str()))
        } else {
            None
        };

        let target = by_type.or_else(|| {
            best_above(
                snapshots.iter().map(|s| average_similarity(profile, &s.members, cap)),
                self.clustering.group_assign_threshold,
            )
        });
        let Some(index) = target else {
            return Some(item);
        };

        let group = &mut groups[index];
        let sub_index = best_above(
            snapshots[index]
                .sub_groups
                .iter()
                .map(|members| average_similarity(profile, members, cap)),
            self.clustering.sub_group_assign_threshold,
        )
        .filter(|&i| !group.sub_groups[i].is_ungrouped_subgroup);

        match sub_index {
            Some(i) => group.sub_groups[i].items.push(item),
            None => match group.sub_groups.iter().position(|s| s.is_ungrouped_subgroup) {
                Some(i) => group.sub_groups[i].items.push(item),
                None => {
                    group.push_sub_group(UNGROUPED_SUB_GROUP, SubGroupOrigin::Ungrouped, vec![item]);
                }
            },
        }
        None
    }
}

struct GroupSnapshot {
    sub_groups: Vec<Vec<ItemProfile>>,
    members: Vec<ItemProfile>,
}

/// Rows of `start..end` to classify: all of them, or `sample_size` evenly spaced
fn sample_rows(start: usize, end: usize, sample_size: usize) -> Vec<usize> {
    let len = end - start;
    if len <= sample_size {
        return (start..end).collect();
    }
    (0..sample_size).map(|i| start + i * len / sample_size).collect()
}

fn avg_confidence(items: &[Classified]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    items.iter().map(|(_, p)| p.classification.confidence).sum::<f64>() / items.len() as f64
}

/// Index of the highest score strictly above `threshold`; first wins ties
fn best_above(scores: impl Iterator<Item = f64>, threshold: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in scores.enumerate() {
        if s > threshold && best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}
