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

//! Division of the overall join key range into rangelets.
//!
//! A rangelet is the smallest unit of the key range that is shuffled or
//! replicated independently. Every slicer returns rangelets that are ordered,
//! pairwise disjoint and whose union is exactly the overall range.

use std::fmt::Debug;
use std::sync::Arc;

use hyperjoin_core::bucket::PhysicalBucket;
use hyperjoin_core::config::{PlannerConfig, SlicingPolicy};
use hyperjoin_core::error::{HyperJoinError, Result};
use hyperjoin_core::range::KeyRange;

/// Policy dividing a key range into rangelets
pub trait RangeSlicer: Debug + Send + Sync {
    /// Returns the name of this slicer (for logging)
    fn name(&self) -> &str;

    /// Divides `overall` into ordered, disjoint and complete rangelets.
    fn slice(&self, overall: &KeyRange) -> Result<Vec<KeyRange>>;
}

/// Creates the slicer selected by the planner configuration.
///
/// `buckets` are the buckets of the first input, used by the
/// bucket-boundaries policy; `samples` are join key samples, used by the
/// quantile policy.
pub fn create_slicer(
    config: &PlannerConfig,
    buckets: &[Arc<PhysicalBucket>],
    samples: &[i64],
) -> Result<Arc<dyn RangeSlicer>> {
    Ok(match config.slicing_policy {
        SlicingPolicy::EqualWidth => {
            Arc::new(EqualWidthSlicer::try_new(config.rangelet_count)?)
        }
        SlicingPolicy::BucketBoundaries => Arc::new(BoundarySlicer::new(
            buckets.iter().map(|b| b.range).collect(),
        )),
        SlicingPolicy::Quantile => Arc::new(QuantileSlicer::try_new(
            samples.to_vec(),
            config.rangelet_count,
        )?),
    })
}

fn check_overall(overall: &KeyRange) -> Result<()> {
    if overall.is_empty() {
        return Err(HyperJoinError::Configuration(
            "cannot slice an empty join key range".to_string(),
        ));
    }
    Ok(())
}

fn check_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(HyperJoinError::Configuration(
            "rangelet count must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Cuts `overall` in front of every cut point. Cut points outside
/// `(low, high]` are ignored.
fn cut_at(overall: &KeyRange, mut cuts: Vec<i64>) -> Vec<KeyRange> {
    cuts.retain(|c| *c > overall.low() && *c <= overall.high());
    cuts.sort_unstable();
    cuts.dedup();

    let mut rangelets = Vec::with_capacity(cuts.len() + 1);
    let mut start = overall.low();
    for cut in cuts {
        rangelets.push(KeyRange::closed(start, cut - 1));
        start = cut;
    }
    rangelets.push(KeyRange::closed(start, overall.high()));
    rangelets
}

/// Divides the key domain into `count` pieces whose widths differ by at most
/// one key. A range holding fewer than `count` keys gets one rangelet per key.
#[derive(Debug, Clone)]
pub struct EqualWidthSlicer {
    count: usize,
}

impl EqualWidthSlicer {
    pub fn try_new(count: usize) -> Result<Self> {
        check_count(count)?;
        Ok(Self { count })
    }
}

impl RangeSlicer for EqualWidthSlicer {
    fn name(&self) -> &str {
        "equal-width"
    }

    fn slice(&self, overall: &KeyRange) -> Result<Vec<KeyRange>> {
        check_overall(overall)?;
        check_count(self.count)?;

        let width = overall.high() as i128 - overall.low() as i128 + 1;
        let pieces = width.min(self.count as i128);
        let base = width / pieces;
        let remainder = width % pieces;

        let mut rangelets = Vec::with_capacity(pieces as usize);
        let mut start = overall.low() as i128;
        for i in 0..pieces {
            let len = base + i128::from(i < remainder);
            let end = start + len - 1;
            rangelets.push(KeyRange::closed(start as i64, end as i64));
            start = end + 1;
        }
        Ok(rangelets)
    }
}

/// Cuts the key range at the bucket boundaries of the first input.
///
/// This is the coarsest slicing in which every bucket is a union of whole
/// rangelets, so no bucket is replicated across rangelets.
#[derive(Debug, Clone)]
pub struct BoundarySlicer {
    boundaries: Vec<KeyRange>,
}

impl BoundarySlicer {
    pub fn new(boundaries: Vec<KeyRange>) -> Self {
        Self { boundaries }
    }
}

impl RangeSlicer for BoundarySlicer {
    fn name(&self) -> &str {
        "bucket-boundaries"
    }

    fn slice(&self, overall: &KeyRange) -> Result<Vec<KeyRange>> {
        check_overall(overall)?;
        let cuts = self
            .boundaries
            .iter()
            .filter(|r| !r.is_empty())
            .flat_map(|r| [Some(r.low()), r.high().checked_add(1)])
            .flatten()
            .collect();
        Ok(cut_at(overall, cuts))
    }
}

/// Cuts the key range at the quantiles of a sample of join key values, so
/// that rangelets hold roughly the same number of sampled keys.
#[derive(Debug, Clone)]
pub struct QuantileSlicer {
    /// sorted
    samples: Vec<i64>,
    count: usize,
}

impl QuantileSlicer {
    pub fn try_new(mut samples: Vec<i64>, count: usize) -> Result<Self> {
        check_count(count)?;
        if samples.is_empty() {
            return Err(HyperJoinError::Configuration(
                "quantile rangelet policy needs join key samples".to_string(),
            ));
        }
        samples.sort_unstable();
        Ok(Self { samples, count })
    }
}

impl RangeSlicer for QuantileSlicer {
    fn name(&self) -> &str {
        "quantile"
    }

    fn slice(&self, overall: &KeyRange) -> Result<Vec<KeyRange>> {
        check_overall(overall)?;
        let samples: Vec<i64> = self
            .samples
            .iter()
            .copied()
            .filter(|k| overall.contains_key(*k))
            .collect();
        let cuts = (1..self.count)
            .filter_map(|i| samples.get(i * samples.len() / self.count).copied())
            .collect();
        Ok(cut_at(overall, cuts))
    }
}
