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

//! Virtual buckets: the contribution of a physical bucket to one rangelet.

use std::fmt;
use std::sync::Arc;

use hyperjoin_core::bucket::PhysicalBucket;
use hyperjoin_core::error::{HyperJoinError, Result};
use hyperjoin_core::range::KeyRange;
use log::debug;

/// A physical bucket confined to the part of its key range that falls in a
/// single rangelet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualBucket {
    bucket: Arc<PhysicalBucket>,
    range: KeyRange,
    rangelet: usize,
}

impl VirtualBucket {
    pub(crate) fn new(bucket: Arc<PhysicalBucket>, range: KeyRange, rangelet: usize) -> Self {
        Self {
            bucket,
            range,
            rangelet,
        }
    }

    pub fn bucket(&self) -> &Arc<PhysicalBucket> {
        &self.bucket
    }

    /// Key range of the bucket within its rangelet
    pub fn range(&self) -> KeyRange {
        self.range
    }

    /// Index of the rangelet this virtual bucket is confined to
    pub fn rangelet(&self) -> usize {
        self.rangelet
    }
}

impl fmt::Display for VirtualBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{} @ rangelet {}",
            self.bucket.location, self.range, self.rangelet
        )
    }
}

/// Builds the virtual buckets of `buckets` over `rangelets`.
///
/// Every bucket is intersected with the rangelets it overlaps; empty
/// intersections are dropped. The pieces of a bucket must tile its key range
/// exactly, otherwise the rangelets do not match the catalog and an
/// [`HyperJoinError::InconsistentRange`] is returned.
pub fn build_virtual_buckets(
    buckets: &[Arc<PhysicalBucket>],
    rangelets: &[KeyRange],
) -> Result<Vec<VirtualBucket>> {
    check_rangelets(rangelets)?;

    let mut vbuckets = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let range = bucket.range;
        if range.is_empty() {
            return Err(HyperJoinError::InconsistentRange(format!(
                "bucket {} has an empty key range",
                bucket.location
            )));
        }

        let first = rangelets.partition_point(|r| r.high() < range.low());
        // next key the pieces of this bucket have to cover
        let mut next = range.low() as i128;
        for (index, rangelet) in rangelets.iter().enumerate().skip(first) {
            if rangelet.low() > range.high() {
                break;
            }
            let piece = rangelet.intersect(&range);
            if piece.is_empty() {
                continue;
            }
            if piece.low() as i128 != next {
                break;
            }
            next = piece.high() as i128 + 1;
            vbuckets.push(VirtualBucket::new(bucket.clone(), piece, index));
        }

        if next != range.high() as i128 + 1 {
            return Err(HyperJoinError::InconsistentRange(format!(
                "bucket {} with keys {range} is not covered by the rangelets from key {next}",
                bucket.location
            )));
        }
    }

    debug!(
        "built {} virtual buckets from {} buckets over {} rangelets",
        vbuckets.len(),
        buckets.len(),
        rangelets.len()
    );
    Ok(vbuckets)
}

fn check_rangelets(rangelets: &[KeyRange]) -> Result<()> {
    if let Some(r) = rangelets.iter().find(|r| r.is_empty()) {
        return Err(HyperJoinError::InconsistentRange(format!(
            "rangelet {r} is empty"
        )));
    }
    if let Some(pair) = rangelets.windows(2).find(|p| p[0].high() >= p[1].low()) {
        return Err(HyperJoinError::InconsistentRange(format!(
            "rangelets {} and {} overlap or are out of order",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
