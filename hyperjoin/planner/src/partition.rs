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

//! Partitions and the cost of merging them.
//!
//! A partition groups virtual buckets of the first input. Its cost is the
//! number of bytes scanned from the first input (`size_a`) plus the number of
//! bytes of the second input matched by its key range (`size_b`), the latter
//! bounding the in-memory structure built for the join.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hyperjoin_core::bucket::PhysicalBucket;
use hyperjoin_core::catalog::SizeLookup;
use hyperjoin_core::error::{HyperJoinError, Result};
use hyperjoin_core::range::KeyRange;

use crate::virtual_bucket::VirtualBucket;

/// Identifier of a live partition within a [`crate::partition_set::PartitionSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(pub usize);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A group of virtual buckets that becomes one join split.
#[derive(Debug, Clone)]
pub struct Partition {
    vbuckets: Vec<VirtualBucket>,
    /// distinct physical buckets backing `vbuckets`, by location
    pbuckets: BTreeMap<String, Arc<PhysicalBucket>>,
    range: KeyRange,
    size_a: u64,
    size_b: u64,
}

impl Partition {
    /// Creates a partition holding a single virtual bucket.
    pub fn try_new(vbucket: VirtualBucket, lookup: &SizeLookup) -> Result<Self> {
        let range = vbucket.range();
        let bucket = vbucket.bucket().clone();
        let size_b = Self::lookup_size_b(&range, lookup)?;
        Ok(Self {
            size_a: bucket.size,
            pbuckets: BTreeMap::from([(bucket.location.clone(), bucket)]),
            vbuckets: vec![vbucket],
            range,
            size_b,
        })
    }

    /// Total size of the second input's buckets intersecting `range`.
    pub fn lookup_size_b(range: &KeyRange, lookup: &SizeLookup) -> Result<u64> {
        lookup.lookup(range)
    }

    /// Merges `other` into a copy of this partition.
    ///
    /// Neither input is modified, so a failed lookup leaves both intact.
    pub fn merge(&self, other: &Partition, lookup: &SizeLookup) -> Result<Partition> {
        let range = self.range.union(&other.range);
        let size_b = Self::lookup_size_b(&range, lookup)?;

        let mut pbuckets = self.pbuckets.clone();
        for (location, bucket) in &other.pbuckets {
            pbuckets
                .entry(location.clone())
                .or_insert_with(|| bucket.clone());
        }
        let mut vbuckets = self.vbuckets.clone();
        vbuckets.extend(other.vbuckets.iter().cloned());

        Ok(Partition {
            size_a: self.combined_size_a(other)?,
            vbuckets,
            pbuckets,
            range,
            size_b,
        })
    }

    /// Bytes scanned from the first input by the union of both partitions.
    /// A physical bucket shared by both partitions is scanned once.
    fn combined_size_a(&self, other: &Partition) -> Result<u64> {
        let shared: u64 = other
            .pbuckets
            .iter()
            .filter(|(location, _)| self.pbuckets.contains_key(*location))
            .map(|(_, bucket)| bucket.size)
            .sum();
        (other.size_a - shared)
            .checked_add(self.size_a)
            .ok_or_else(|| {
                HyperJoinError::InconsistentRange(format!(
                    "bytes scanned by the union of {self} and {other} overflow"
                ))
            })
    }

    pub fn virtual_buckets(&self) -> &[VirtualBucket] {
        &self.vbuckets
    }

    pub fn physical_buckets(&self) -> impl Iterator<Item = &Arc<PhysicalBucket>> {
        self.pbuckets.values()
    }

    pub fn range(&self) -> KeyRange {
        self.range
    }

    pub fn size_a(&self) -> u64 {
        self.size_a
    }

    pub fn size_b(&self) -> u64 {
        self.size_b
    }

    pub fn cost(&self) -> u128 {
        self.size_a as u128 + self.size_b as u128
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Partition[vbuckets={}, buckets={}, range={}, sizeA={}, sizeB={}]",
            self.vbuckets.len(),
            self.pbuckets.len(),
            self.range,
            self.size_a,
            self.size_b
        )
    }
}

/// Resource caps a merged partition has to respect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLimits {
    /// Cap on `size_a + size_b`
    pub max_partition_size: u64,
    /// Cap on `size_b`
    pub max_hash_table_size: u64,
}

/// A scored pair of partitions that could be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    first: PartitionId,
    second: PartitionId,
    range: KeyRange,
    combined_size_a: u64,
    combined_size_b: u64,
    reduction: i128,
}

impl MergeCandidate {
    /// Scores merging `first` and `second`. The second input's size is looked
    /// up over the union of both ranges rather than summed, since both
    /// partitions may match the same buckets.
    pub fn evaluate(
        first: (PartitionId, &Partition),
        second: (PartitionId, &Partition),
        lookup: &SizeLookup,
    ) -> Result<Self> {
        let (first_id, p1) = first;
        let (second_id, p2) = second;
        let range = p1.range.union(&p2.range);
        let combined_size_a = p1.combined_size_a(p2)?;
        let combined_size_b = Partition::lookup_size_b(&range, lookup)?;
        let reduction = p1.cost() as i128 + p2.cost() as i128
            - (combined_size_a as i128 + combined_size_b as i128);
        Ok(Self {
            first: first_id,
            second: second_id,
            range,
            combined_size_a,
            combined_size_b,
            reduction,
        })
    }

    /// True if the pair may be merged under `limits`.
    pub fn is_eligible(&self, limits: &MergeLimits) -> bool {
        self.first != self.second
            && (self.combined_size_a as u128 + self.combined_size_b as u128)
                <= limits.max_partition_size as u128
            && self.combined_size_b <= limits.max_hash_table_size
    }

    /// Orders candidates by preference: the larger cost reduction wins, then
    /// the lower merged range start, then the lower pair of ids.
    pub fn cmp_preference(&self, other: &MergeCandidate) -> Ordering {
        self.reduction
            .cmp(&other.reduction)
            .then_with(|| other.range.low().cmp(&self.range.low()))
            .then_with(|| (other.first, other.second).cmp(&(self.first, self.second)))
    }

    pub fn first(&self) -> PartitionId {
        self.first
    }

    pub fn second(&self) -> PartitionId {
        self.second
    }

    /// Key range of the merged partition
    pub fn range(&self) -> KeyRange {
        self.range
    }

    pub fn combined_size_a(&self) -> u64 {
        self.combined_size_a
    }

    pub fn combined_size_b(&self) -> u64 {
        self.combined_size_b
    }

    pub fn combined_cost(&self) -> u128 {
        self.combined_size_a as u128 + self.combined_size_b as u128
    }

    /// Decrease of the total cost if the pair is merged; negative if merging
    /// would increase it.
    pub fn reduction(&self) -> i128 {
        self.reduction
    }
}

/// Keeps the preferred of two optional candidates.
pub(crate) fn prefer(
    best: Option<MergeCandidate>,
    candidate: Option<MergeCandidate>,
) -> Option<MergeCandidate> {
    match (best, candidate) {
        (Some(best), Some(candidate)) => {
            if candidate.cmp_preference(&best) == Ordering::Greater {
                Some(candidate)
            } else {
                Some(best)
            }
        }
        (best, None) => best,
        (None, candidate) => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{catalog, vbucket};

    const LIMITS: MergeLimits = MergeLimits {
        max_partition_size: 1000,
        max_hash_table_size: 1000,
    };

    fn second_input() -> Result<SizeLookup> {
        Ok(SizeLookup::new(catalog(
            "b",
            &[("b1", 8, 0, 9), ("b2", 7, 5, 14), ("b3", 8, 10, 19)],
        )?))
    }

    #[test]
    fn singleton_partition() -> Result<()> {
        let lookup = second_input()?;
        let p = Partition::try_new(vbucket("a1", 10, 0, 4, 0), &lookup)?;
        assert_eq!(p.size_a(), 10);
        assert_eq!(p.size_b(), 8);
        assert_eq!(p.cost(), 18);
        assert_eq!(p.range(), KeyRange::closed(0, 4));
        assert_eq!(Partition::lookup_size_b(&p.range(), &lookup)?, p.size_b());
        Ok(())
    }

    #[test]
    fn merge_recomputes_size_b_over_the_union() -> Result<()> {
        let lookup = second_input()?;
        let p1 = Partition::try_new(vbucket("a1", 10, 0, 4, 0), &lookup)?;
        let p2 = Partition::try_new(vbucket("a2", 10, 15, 19, 1), &lookup)?;
        assert_eq!(p1.size_b(), 8);
        assert_eq!(p2.size_b(), 8);

        let candidate = MergeCandidate::evaluate((PartitionId(0), &p1), (PartitionId(1), &p2), &lookup)?;
        assert_eq!(candidate.combined_size_a(), 20);
        // the hull [0, 19] also matches b2
        assert_eq!(candidate.combined_size_b(), 23);
        assert_eq!(candidate.reduction(), 36 - 43);
        assert!(candidate.is_eligible(&LIMITS));

        let merged = p1.merge(&p2, &lookup)?;
        assert_eq!(merged.size_a(), 20);
        assert_eq!(merged.size_b(), 23);
        assert_eq!(merged.range(), KeyRange::closed(0, 19));
        assert_eq!(merged.virtual_buckets().len(), 2);
        assert_eq!(merged.physical_buckets().count(), 2);
        Ok(())
    }

    #[test]
    fn shared_physical_bucket_is_scanned_once() -> Result<()> {
        let lookup = second_input()?;
        let p1 = Partition::try_new(vbucket("a1", 10, 0, 4, 0), &lookup)?;
        let p2 = Partition::try_new(vbucket("a1", 10, 5, 9, 1), &lookup)?;

        let candidate = MergeCandidate::evaluate((PartitionId(0), &p1), (PartitionId(1), &p2), &lookup)?;
        assert_eq!(candidate.combined_size_a(), 10);
        assert_eq!(candidate.combined_size_b(), 15);
        assert_eq!(candidate.reduction(), (18 + 25) - 25);

        let merged = p1.merge(&p2, &lookup)?;
        assert_eq!(merged.size_a(), 10);
        assert_eq!(merged.physical_buckets().count(), 1);
        assert_eq!(merged.virtual_buckets().len(), 2);
        Ok(())
    }

    #[test]
    fn eligibility_respects_both_caps() -> Result<()> {
        let lookup = second_input()?;
        let p1 = Partition::try_new(vbucket("a1", 10, 0, 4, 0), &lookup)?;
        let p2 = Partition::try_new(vbucket("a2", 10, 5, 9, 1), &lookup)?;
        let candidate = MergeCandidate::evaluate((PartitionId(0), &p1), (PartitionId(1), &p2), &lookup)?;
        assert_eq!(candidate.combined_cost(), 35);

        let tight_partition = MergeLimits {
            max_partition_size: 34,
            max_hash_table_size: 1000,
        };
        assert!(!candidate.is_eligible(&tight_partition));

        let tight_hash_table = MergeLimits {
            max_partition_size: 1000,
            max_hash_table_size: 14,
        };
        assert!(!candidate.is_eligible(&tight_hash_table));

        let exact = MergeLimits {
            max_partition_size: 35,
            max_hash_table_size: 15,
        };
        assert!(candidate.is_eligible(&exact));

        let same = MergeCandidate::evaluate((PartitionId(0), &p1), (PartitionId(0), &p1), &lookup)?;
        assert!(!same.is_eligible(&LIMITS));
        Ok(())
    }

    #[test]
    fn preference_breaks_ties_deterministically() -> Result<()> {
        let lookup = second_input()?;
        let p1 = Partition::try_new(vbucket("a1", 10, 0, 4, 0), &lookup)?;
        let p2 = Partition::try_new(vbucket("a2", 10, 5, 9, 1), &lookup)?;
        let p3 = Partition::try_new(vbucket("a3", 10, 0, 4, 0), &lookup)?;

        let c12 = MergeCandidate::evaluate((PartitionId(1), &p1), (PartitionId(2), &p2), &lookup)?;
        let c32 = MergeCandidate::evaluate((PartitionId(3), &p3), (PartitionId(2), &p2), &lookup)?;
        assert_eq!(c12.reduction(), c32.reduction());
        assert_eq!(c12.range(), c32.range());
        assert_eq!(c12.cmp_preference(&c32), Ordering::Greater);
        assert_eq!(prefer(Some(c32.clone()), Some(c12.clone())), Some(c12.clone()));
        assert_eq!(prefer(None, Some(c32.clone())), Some(c32));
        Ok(())
    }

    #[test]
    fn costs_beyond_u64_are_exact() -> Result<()> {
        let lookup = second_input()?;
        let p1 = Partition::try_new(vbucket("a1", u64::MAX - 5, 0, 4, 0), &lookup)?;
        assert_eq!(p1.cost(), u64::MAX as u128 + 3);

        let p2 = Partition::try_new(vbucket("a1", u64::MAX - 5, 5, 9, 1), &lookup)?;
        let candidate = MergeCandidate::evaluate((PartitionId(0), &p1), (PartitionId(1), &p2), &lookup)?;
        assert_eq!(candidate.combined_size_a(), u64::MAX - 5);
        assert_eq!(candidate.combined_cost(), u64::MAX as u128 + 10);
        // the shared bucket is scanned once: the saving is one scan plus b1
        assert_eq!(candidate.reduction(), (u64::MAX - 5) as i128 + 8);
        Ok(())
    }

    #[test]
    fn overflowing_first_input_size_is_an_error() -> Result<()> {
        let lookup = second_input()?;
        let half = u64::MAX / 2 + 1;
        let p1 = Partition::try_new(vbucket("a1", half, 0, 4, 0), &lookup)?;
        let p2 = Partition::try_new(vbucket("a2", half, 5, 9, 1), &lookup)?;

        let err = MergeCandidate::evaluate((PartitionId(0), &p1), (PartitionId(1), &p2), &lookup)
            .unwrap_err();
        assert!(matches!(err, HyperJoinError::InconsistentRange(_)));
        let err = p1.merge(&p2, &lookup).unwrap_err();
        assert!(matches!(err, HyperJoinError::InconsistentRange(_)));
        Ok(())
    }

    #[test]
    fn lookup_failure_is_propagated() -> Result<()> {
        let lookup = SizeLookup::new(crate::test_utils::failing_catalog());
        let err = Partition::try_new(vbucket("a1", 10, 0, 4, 0), &lookup).unwrap_err();
        assert!(matches!(err, HyperJoinError::LookupFailure(_)));
        Ok(())
    }
}
