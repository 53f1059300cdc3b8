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

//! Join split planning
//!
//! Turns the bucket catalogs of two range partitioned join inputs into a
//! bounded number of join splits. Buckets of the first input are cut into
//! virtual buckets along rangelets and greedily clustered, merging at each
//! step the pair of partitions with the largest cost reduction, until no
//! merge pays off or the minimum number of splits is reached.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use hyperjoin_core::catalog::{BucketCatalog, SizeLookup};
use hyperjoin_core::config::{HyperJoinConfig, PlannerConfig};
use hyperjoin_core::error::Result;
use hyperjoin_core::split::JoinSplit;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::candidate::{CandidateSelector, ExhaustiveSelector};
use crate::partition::MergeLimits;
use crate::partition_set::PartitionSet;
use crate::slicer::{create_slicer, RangeSlicer};
use crate::virtual_bucket::build_virtual_buckets;

/// Stages of a planning run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    /// Not started
    Created,
    Slicing,
    BuildingVirtualBuckets,
    Clustering,
    Emitting,
    /// Terminal
    Done,
}

impl fmt::Display for PlannerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PlannerState::Created => "CREATED",
            PlannerState::Slicing => "SLICING",
            PlannerState::BuildingVirtualBuckets => "BUILDING_VBUCKETS",
            PlannerState::Clustering => "CLUSTERING",
            PlannerState::Emitting => "EMITTING",
            PlannerState::Done => "DONE",
        };
        write!(f, "{name}")
    }
}

/// Summary of a planning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub rangelets: usize,
    pub virtual_buckets: usize,
    pub splits: usize,
    pub merges: usize,
    /// Total cost of the singleton partitions
    pub initial_cost: u128,
    /// Total cost of the emitted splits
    pub final_cost: u128,
    /// Distinct key ranges looked up in the second input
    pub size_lookups: usize,
    pub elapsed_ms: u128,
}

impl fmt::Display for PlanMetrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rangelets={}, virtualBuckets={}, splits={}, merges={}, initialCost={}, finalCost={}, sizeLookups={}, elapsed={}ms",
            self.rangelets,
            self.virtual_buckets,
            self.splits,
            self.merges,
            self.initial_cost,
            self.final_cost,
            self.size_lookups,
            self.elapsed_ms
        )
    }
}

/// The splits of a join together with planning metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlan {
    pub splits: Vec<JoinSplit>,
    pub metrics: PlanMetrics,
}

/// Plans the splits of a join between two range partitioned inputs.
///
/// A planner is used for a single run: [`JoinSplitPlanner::plan`] consumes
/// it. Both catalogs are immutable snapshots, so a plan is a deterministic
/// function of the catalogs and the configuration.
#[derive(Debug)]
pub struct JoinSplitPlanner {
    catalog_a: Arc<dyn BucketCatalog>,
    catalog_b: Arc<dyn BucketCatalog>,
    config: PlannerConfig,
    selector: Arc<dyn CandidateSelector>,
    slicer: Option<Arc<dyn RangeSlicer>>,
    key_samples: Vec<i64>,
    state: PlannerState,
}

impl JoinSplitPlanner {
    /// Creates a planner, failing with a configuration error before any work
    /// is done if the parameters are invalid.
    pub fn try_new(
        catalog_a: Arc<dyn BucketCatalog>,
        catalog_b: Arc<dyn BucketCatalog>,
        config: PlannerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let selector = default_selector(&config);
        Ok(Self {
            catalog_a,
            catalog_b,
            config,
            selector,
            slicer: None,
            key_samples: vec![],
            state: PlannerState::Created,
        })
    }

    /// Creates a planner from key-value settings; missing mandatory settings
    /// are configuration errors.
    pub fn try_from_config(
        catalog_a: Arc<dyn BucketCatalog>,
        catalog_b: Arc<dyn BucketCatalog>,
        config: &HyperJoinConfig,
    ) -> Result<Self> {
        Self::try_new(catalog_a, catalog_b, PlannerConfig::try_from(config)?)
    }

    /// Replaces the merge candidate selector.
    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replaces the slicer chosen by the configured rangelet policy.
    pub fn with_slicer(mut self, slicer: Arc<dyn RangeSlicer>) -> Self {
        self.slicer = Some(slicer);
        self
    }

    /// Join key samples for the quantile rangelet policy.
    pub fn with_key_samples(mut self, samples: Vec<i64>) -> Self {
        self.key_samples = samples;
        self
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn transition(&mut self, state: PlannerState) {
        debug!(
            "join {} x {}: {} -> {state}",
            self.catalog_a.input_id(),
            self.catalog_b.input_id(),
            self.state
        );
        self.state = state;
    }

    /// Runs the planner. Any failure aborts the whole run; no partial plan is
    /// ever returned.
    pub fn plan(mut self) -> Result<JoinPlan> {
        let started = Instant::now();
        let mut metrics = PlanMetrics::default();

        self.transition(PlannerState::Slicing);
        let full_range = self.catalog_a.full_range()?;
        let buckets = self.catalog_a.buckets()?;
        let slicer = match &self.slicer {
            Some(slicer) => slicer.clone(),
            None => create_slicer(&self.config, &buckets, &self.key_samples)?,
        };
        let rangelets = slicer.slice(&full_range)?;
        debug!(
            "{} slicer cut {full_range} into {} rangelets",
            slicer.name(),
            rangelets.len()
        );
        metrics.rangelets = rangelets.len();

        self.transition(PlannerState::BuildingVirtualBuckets);
        let vbuckets = build_virtual_buckets(&buckets, &rangelets)?;
        metrics.virtual_buckets = vbuckets.len();

        self.transition(PlannerState::Clustering);
        let lookup = SizeLookup::new(self.catalog_b.clone());
        let mut partitions = PartitionSet::try_new(vbuckets, &lookup)?;
        metrics.initial_cost = partitions.total_cost();
        metrics.merges = self.cluster(&mut partitions, &lookup)?;
        metrics.final_cost = partitions.total_cost();
        metrics.size_lookups = lookup.cached_ranges();

        self.transition(PlannerState::Emitting);
        let splits = partitions.into_join_splits();
        metrics.splits = splits.len();
        metrics.elapsed_ms = started.elapsed().as_millis();

        self.transition(PlannerState::Done);
        info!(
            "planned join {} x {}: {metrics}",
            self.catalog_a.input_id(),
            self.catalog_b.input_id()
        );
        Ok(JoinPlan { splits, metrics })
    }

    /// Greedily merges partitions while the partition count is above the
    /// floor and the last merge strictly reduced the total cost. Returns the
    /// number of merges.
    fn cluster(&self, partitions: &mut PartitionSet, lookup: &SizeLookup) -> Result<usize> {
        let limits = MergeLimits {
            max_partition_size: self.config.max_partition_size,
            max_hash_table_size: self.config.max_hash_table_size,
        };

        let mut merges = 0;
        while partitions.len() > self.config.min_splits {
            let Some(candidate) = self.selector.select(partitions, &limits, lookup)? else {
                debug!("no eligible merge candidate among {} partitions", partitions.len());
                break;
            };
            if candidate.reduction() <= 0 {
                debug!(
                    "best merge of {} and {} does not reduce cost ({})",
                    candidate.first(),
                    candidate.second(),
                    candidate.reduction()
                );
                break;
            }

            let cost_before = partitions.total_cost();
            let merged = partitions.merge(&candidate, lookup)?;
            merges += 1;
            let cost_after = partitions.total_cost();
            debug!(
                "merged {} and {} into {merged} over {}: cost {cost_before} -> {cost_after}",
                candidate.first(),
                candidate.second(),
                candidate.range()
            );
            if cost_after >= cost_before {
                break;
            }
        }
        Ok(merges)
    }
}

fn default_selector(config: &PlannerConfig) -> Arc<dyn CandidateSelector> {
    if config.parallel_candidates {
        match parallel_selector() {
            Some(selector) => return selector,
            None => warn!(
                "parallel candidate scoring requested but the `parallel` feature is disabled"
            ),
        }
    }
    Arc::new(ExhaustiveSelector)
}

#[cfg(feature = "parallel")]
fn parallel_selector() -> Option<Arc<dyn CandidateSelector>> {
    Some(Arc::new(crate::candidate::ParallelSelector::new()))
}

#[cfg(not(feature = "parallel"))]
fn parallel_selector() -> Option<Arc<dyn CandidateSelector>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slicer::EqualWidthSlicer;
    use crate::test_utils::{catalog, failing_catalog};
    use hyperjoin_core::config::{
        SlicingPolicy, HYPERJOIN_MAX_HASH_TABLE_SIZE, HYPERJOIN_MAX_PARTITION_SIZE,
        HYPERJOIN_MIN_SPLITS,
    };
    use hyperjoin_core::error::HyperJoinError;
    use hyperjoin_core::range::KeyRange;

    #[test]
    fn merges_pair_sharing_second_input() -> Result<()> {
        // two virtual buckets of 10 bytes, each matching 8 bytes on its own
        // and 9 bytes together
        let a = catalog("a", &[("a1", 10, 0, 9), ("a2", 10, 10, 19)])?;
        let b = catalog("b", &[("b1", 7, 0, 19), ("b2", 1, 0, 9), ("b3", 1, 10, 19)])?;
        let config = PlannerConfig::new(1, 1000, 1000)
            .with_slicing_policy(SlicingPolicy::BucketBoundaries);
        let planner = JoinSplitPlanner::try_new(a, b, config)?;
        assert_eq!(planner.state(), PlannerState::Created);

        let plan = planner.plan()?;
        assert_eq!(plan.metrics.virtual_buckets, 2);
        assert_eq!(plan.metrics.merges, 1);
        assert_eq!(plan.metrics.initial_cost, 36);
        assert_eq!(plan.metrics.final_cost, 29);
        assert_eq!(plan.splits.len(), 1);
        assert_eq!(plan.splits[0].locations(), vec![("a1", 10), ("a2", 10)]);
        assert_eq!(plan.splits[0].range, KeyRange::closed(0, 19));
        Ok(())
    }

    #[test]
    fn replicated_bucket_is_merged_back() -> Result<()> {
        // one bucket spanning four rangelets: merging its pieces saves the
        // repeated scans
        let a = catalog("a", &[("a1", 100, 0, 99)])?;
        let b = catalog("b", &[("b1", 10, 0, 99)])?;
        let planner = JoinSplitPlanner::try_new(a, b, PlannerConfig::new(1, 1000, 1000))?
            .with_slicer(Arc::new(EqualWidthSlicer::try_new(4)?));
        let plan = planner.plan()?;
        assert_eq!(plan.metrics.virtual_buckets, 4);
        assert_eq!(plan.metrics.initial_cost, 440);
        assert_eq!(plan.splits.len(), 1);
        assert_eq!(plan.metrics.final_cost, 110);
        assert_eq!(
            plan.splits[0].buckets[0].ranges,
            vec![KeyRange::closed(0, 99)]
        );
        Ok(())
    }

    #[test]
    fn bucket_sizes_near_u64_max_are_planned() -> Result<()> {
        let a = catalog("a", &[("a1", u64::MAX - 5, 0, 9)])?;
        let b = catalog("b", &[("b1", 10, 0, 9)])?;
        let config = PlannerConfig::new(1, u64::MAX, u64::MAX)
            .with_slicing_policy(SlicingPolicy::BucketBoundaries);
        let plan = JoinSplitPlanner::try_new(a, b, config)?.plan()?;
        assert_eq!(plan.splits.len(), 1);
        assert_eq!(plan.metrics.initial_cost, u64::MAX as u128 + 5);
        assert_eq!(plan.metrics.final_cost, u64::MAX as u128 + 5);
        assert_eq!(plan.splits[0].cost(), u64::MAX as u128 + 5);

        // four replicas of the bucket cost more than u64::MAX before merging
        let a = catalog("a", &[("a1", u64::MAX - 100, 0, 99)])?;
        let b = catalog("b", &[("b1", 10, 0, 99)])?;
        let plan = JoinSplitPlanner::try_new(a, b, PlannerConfig::new(1, u64::MAX, u64::MAX))?
            .with_slicer(Arc::new(EqualWidthSlicer::try_new(4)?))
            .plan()?;
        assert_eq!(plan.metrics.initial_cost, 4 * (u64::MAX as u128 - 90));
        assert_eq!(plan.splits.len(), 1);
        assert_eq!(plan.metrics.final_cost, u64::MAX as u128 - 90);
        Ok(())
    }

    #[test]
    fn missing_configuration_fails_before_planning() -> Result<()> {
        let a = catalog("a", &[("a1", 10, 0, 9)])?;
        let b = catalog("b", &[("b1", 10, 0, 9)])?;
        let config = HyperJoinConfig::default()
            .with_setting(HYPERJOIN_MIN_SPLITS, "1")?
            .with_setting(HYPERJOIN_MAX_PARTITION_SIZE, "100")?;
        let err = JoinSplitPlanner::try_from_config(a.clone(), b.clone(), &config).unwrap_err();
        assert!(matches!(err, HyperJoinError::Configuration(_)));

        let config = config.with_setting(HYPERJOIN_MAX_HASH_TABLE_SIZE, "100")?;
        let planner = JoinSplitPlanner::try_from_config(a, b, &config)?;
        assert_eq!(planner.config().max_hash_table_size, 100);
        Ok(())
    }

    #[test]
    fn lookup_failure_aborts_the_run() -> Result<()> {
        let a = catalog("a", &[("a1", 10, 0, 9)])?;
        let planner =
            JoinSplitPlanner::try_new(a, failing_catalog(), PlannerConfig::new(1, 100, 100))?;
        let err = planner.plan().unwrap_err();
        assert!(matches!(err, HyperJoinError::LookupFailure(_)));
        Ok(())
    }

    #[test]
    fn empty_first_input_cannot_be_sliced() -> Result<()> {
        let a = catalog("a", &[])?;
        let b = catalog("b", &[("b1", 10, 0, 9)])?;
        let err = JoinSplitPlanner::try_new(a, b, PlannerConfig::new(1, 100, 100))?
            .plan()
            .unwrap_err();
        assert!(matches!(err, HyperJoinError::Configuration(_)));
        Ok(())
    }
}
