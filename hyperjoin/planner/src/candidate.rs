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

//! Merge candidate selection
//!
//! A clustering step scores pairs of live partitions and merges the eligible
//! pair with the largest cost reduction. Scoring is read-only over the
//! partition set, so it is kept behind [`CandidateSelector`] and may be
//! replaced by a smarter (e.g. range indexed) or parallel enumeration
//! without changing the cost contract.

use std::fmt::Debug;

use hyperjoin_core::catalog::SizeLookup;
use hyperjoin_core::error::Result;

use crate::partition::{prefer, MergeCandidate, MergeLimits, Partition, PartitionId};
use crate::partition_set::PartitionSet;

/// Picks the pair of partitions to merge in one clustering step.
pub trait CandidateSelector: Debug + Send + Sync {
    /// Returns the name of this selector (for logging)
    fn name(&self) -> &str;

    /// Returns the eligible candidate with the largest cost reduction, ties
    /// broken by [`MergeCandidate::cmp_preference`], or `None` if no pair of
    /// partitions may be merged under `limits`.
    fn select(
        &self,
        partitions: &PartitionSet,
        limits: &MergeLimits,
        lookup: &SizeLookup,
    ) -> Result<Option<MergeCandidate>>;
}

/// Scores every unordered pair of live partitions, O(n²) per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveSelector;

impl CandidateSelector for ExhaustiveSelector {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn select(
        &self,
        partitions: &PartitionSet,
        limits: &MergeLimits,
        lookup: &SizeLookup,
    ) -> Result<Option<MergeCandidate>> {
        let live: Vec<(PartitionId, &Partition)> = partitions.iter().collect();
        let mut best = None;
        for i in 0..live.len() {
            best = prefer(best, best_with_successors(&live, i, limits, lookup)?);
        }
        Ok(best)
    }
}

/// Best eligible candidate pairing `live[i]` with a partition after it.
fn best_with_successors(
    live: &[(PartitionId, &Partition)],
    i: usize,
    limits: &MergeLimits,
    lookup: &SizeLookup,
) -> Result<Option<MergeCandidate>> {
    let mut best = None;
    for j in i + 1..live.len() {
        let candidate = MergeCandidate::evaluate(live[i], live[j], lookup)?;
        if candidate.is_eligible(limits) {
            best = prefer(best, Some(candidate));
        }
    }
    Ok(best)
}

#[cfg(feature = "parallel")]
pub use parallel::ParallelSelector;

#[cfg(feature = "parallel")]
mod parallel {
    use std::fmt;
    use std::sync::Arc;

    use hyperjoin_core::error::HyperJoinError;
    use rayon::prelude::*;
    use rayon::ThreadPool;

    use super::*;

    /// Scores candidate pairs on a rayon thread pool.
    ///
    /// Produces the same candidate as [`ExhaustiveSelector`]: each worker
    /// keeps its preferred candidate and the results are reduced with the
    /// same preference order.
    #[derive(Clone, Default)]
    pub struct ParallelSelector {
        /// dedicated pool, the global rayon pool if `None`
        pool: Option<Arc<ThreadPool>>,
    }

    impl ParallelSelector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Uses a dedicated pool with `threads` workers.
        pub fn with_threads(threads: usize) -> Result<Self> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("hyperjoin-candidates-{i}"))
                .build()
                .map_err(|e| {
                    HyperJoinError::Internal(format!(
                        "failed to build candidate thread pool: {e}"
                    ))
                })?;
            Ok(Self {
                pool: Some(Arc::new(pool)),
            })
        }

        fn select_par(
            partitions: &PartitionSet,
            limits: &MergeLimits,
            lookup: &SizeLookup,
        ) -> Result<Option<MergeCandidate>> {
            let live: Vec<(PartitionId, &Partition)> = partitions.iter().collect();
            (0..live.len())
                .into_par_iter()
                .map(|i| best_with_successors(&live, i, limits, lookup))
                .try_reduce(|| None, |a, b| Ok(prefer(a, b)))
        }
    }

    impl fmt::Debug for ParallelSelector {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ParallelSelector")
                .field(
                    "threads",
                    &self.pool.as_ref().map(|pool| pool.current_num_threads()),
                )
                .finish()
        }
    }

    impl CandidateSelector for ParallelSelector {
        fn name(&self) -> &str {
            "parallel"
        }

        fn select(
            &self,
            partitions: &PartitionSet,
            limits: &MergeLimits,
            lookup: &SizeLookup,
        ) -> Result<Option<MergeCandidate>> {
            match &self.pool {
                Some(pool) => {
                    pool.install(|| Self::select_par(partitions, limits, lookup))
                }
                None => Self::select_par(partitions, limits, lookup),
            }
        }
    }
}
