// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The working set of partitions during clustering.

use std::collections::BTreeMap;

use hyperjoin_core::catalog::SizeLookup;
use hyperjoin_core::error::{HyperJoinError, Result};
use hyperjoin_core::range::KeyRange;
use hyperjoin_core::split::{JoinSplit, SplitBucket};
use log::trace;

use crate::partition::{MergeCandidate, Partition, PartitionId};
use crate::virtual_bucket::VirtualBucket;

/// The live partitions, keyed by id.
///
/// Every virtual bucket belongs to exactly one live partition; merging
/// replaces two partitions with their union and keeps this invariant.
#[derive(Debug, Clone, Default)]
pub struct PartitionSet {
    partitions: BTreeMap<PartitionId, Partition>,
    next_id: usize,
}

impl PartitionSet {
    /// Creates one singleton partition per virtual bucket.
    pub fn try_new(vbuckets: Vec<VirtualBucket>, lookup: &SizeLookup) -> Result<Self> {
        let mut set = Self::default();
        for vbucket in vbuckets {
            let partition = Partition::try_new(vbucket, lookup)?;
            set.insert(partition);
        }
        Ok(set)
    }

    fn insert(&mut self, partition: Partition) -> PartitionId {
        let id = PartitionId(self.next_id);
        self.next_id += 1;
        self.partitions.insert(id, partition);
        id
    }

    pub fn get(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(&id)
    }

    /// Live partitions in id order
    pub fn iter(&self) -> impl Iterator<Item = (PartitionId, &Partition)> {
        self.partitions.iter().map(|(id, p)| (*id, p))
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Sum of the costs of all live partitions
    pub fn total_cost(&self) -> u128 {
        self.partitions.values().map(|p| p.cost()).sum()
    }

    pub fn virtual_bucket_count(&self) -> usize {
        self.partitions
            .values()
            .map(|p| p.virtual_buckets().len())
            .sum()
    }

    /// Replaces the two partitions of `candidate` with their union and
    /// returns the id of the merged partition.
    ///
    /// The merged partition is built before the set is touched, so on error
    /// the set is left unchanged.
    pub fn merge(
        &mut self,
        candidate: &MergeCandidate,
        lookup: &SizeLookup,
    ) -> Result<PartitionId> {
        let (first, second) = (candidate.first(), candidate.second());
        if first == second {
            return Err(HyperJoinError::Internal(format!(
                "cannot merge partition {first} with itself"
            )));
        }
        let (Some(p1), Some(p2)) = (self.partitions.get(&first), self.partitions.get(&second))
        else {
            return Err(HyperJoinError::Internal(format!(
                "merge candidate ({first}, {second}) refers to a partition that is not live"
            )));
        };

        let merged = p1.merge(p2, lookup)?;
        self.partitions.remove(&first);
        self.partitions.remove(&second);
        let id = self.insert(merged);
        trace!("merged {first} and {second} into {id}");
        Ok(id)
    }

    /// Materializes one join split per live partition, ordered by key range.
    pub fn into_join_splits(self) -> Vec<JoinSplit> {
        let mut partitions: Vec<(PartitionId, Partition)> =
            self.partitions.into_iter().collect();
        partitions.sort_by_key(|(id, p)| (p.range().low(), p.range().high(), *id));

        partitions
            .into_iter()
            .enumerate()
            .map(|(split_id, (_, partition))| JoinSplit {
                split_id,
                buckets: split_buckets(&partition),
                range: partition.range(),
                size_a: partition.size_a(),
                size_b: partition.size_b(),
            })
            .collect()
    }
}

/// Groups the virtual buckets of a partition by physical bucket, coalescing
/// the key ranges of adjacent rangelets.
fn split_buckets(partition: &Partition) -> Vec<SplitBucket> {
    let mut ranges: BTreeMap<&str, Vec<KeyRange>> = BTreeMap::new();
    for vbucket in partition.virtual_buckets() {
        ranges
            .entry(vbucket.bucket().location.as_str())
            .or_default()
            .push(vbucket.range());
    }

    partition
        .physical_buckets()
        .map(|bucket| {
            let mut owned = ranges.remove(bucket.location.as_str()).unwrap_or_default();
            owned.sort_by_key(|r| r.low());
            SplitBucket {
                location: bucket.location.clone(),
                length: bucket.size,
                ranges: coalesce(owned),
            }
        })
        .collect()
}

fn coalesce(ranges: Vec<KeyRange>) -> Vec<KeyRange> {
    let mut coalesced: Vec<KeyRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match coalesced.last_mut() {
            Some(last) if last.high() as i128 + 1 == range.low() as i128 => {
                *last = last.union(&range);
            }
            _ => coalesced.push(range),
        }
    }
    coalesced
}
