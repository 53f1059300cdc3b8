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

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use hyperjoin_core::bucket::PhysicalBucket;
use hyperjoin_core::catalog::{BucketCatalog, InMemoryBucketCatalog};
use hyperjoin_core::error::Result;
use hyperjoin_core::range::KeyRange;
use hyperjoin_core::split::JoinSplit;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Enable RUST_LOG logging configuration for test
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_filters("hyperjoin_planner=debug")
        .is_test(true)
        .try_init();
}

/// Builds an in-memory catalog from `(location, size, low, high)` tuples.
#[allow(dead_code)]
pub fn catalog(
    input_id: &str,
    buckets: &[(&str, u64, i64, i64)],
) -> Result<Arc<dyn BucketCatalog>> {
    let buckets = buckets
        .iter()
        .map(|(location, size, low, high)| {
            PhysicalBucket::new(*location, *size, KeyRange::closed(*low, *high))
        })
        .collect();
    Ok(Arc::new(InMemoryBucketCatalog::try_new(input_id, buckets)?))
}

/// A catalog of `count` buckets with random, possibly overlapping key ranges
/// within `[0, domain)` and sizes in `[1, max_size]`.
#[allow(dead_code)]
pub fn random_catalog(
    input_id: &str,
    seed: u64,
    count: usize,
    domain: i64,
    max_size: u64,
) -> Result<Arc<InMemoryBucketCatalog>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let buckets = (0..count)
        .map(|i| {
            let low = rng.random_range(0..domain);
            let high = rng.random_range(low..=(low + domain / 8).min(domain - 1));
            PhysicalBucket::new(
                format!("{input_id}/part-{i:04}"),
                rng.random_range(1..=max_size),
                KeyRange::closed(low, high),
            )
        })
        .collect();
    Ok(Arc::new(InMemoryBucketCatalog::try_new(input_id, buckets)?))
}

/// Asserts that the splits cover every bucket of `catalog` and that the key
/// ranges owned by the splits tile each bucket exactly once.
#[allow(dead_code)]
pub fn assert_complete_and_disjoint(catalog: &dyn BucketCatalog, splits: &[JoinSplit]) {
    let mut owned: BTreeMap<String, Vec<KeyRange>> = BTreeMap::new();
    for split in splits {
        let mut seen = HashSet::new();
        for bucket in &split.buckets {
            assert!(
                seen.insert(bucket.location.clone()),
                "bucket {} listed twice in split {}",
                bucket.location,
                split.split_id
            );
            assert!(!bucket.ranges.is_empty());
            for range in &bucket.ranges {
                assert!(split.range.contains(range));
            }
            owned
                .entry(bucket.location.clone())
                .or_default()
                .extend(bucket.ranges.iter().copied());
        }
    }

    let buckets = catalog.buckets().expect("buckets");
    assert_eq!(owned.len(), buckets.len(), "every bucket is scanned");
    for bucket in buckets {
        let mut ranges = owned.remove(&bucket.location).expect("bucket is scanned");
        ranges.sort_by_key(|r| r.low());
        let mut next = bucket.range.low() as i128;
        for range in ranges {
            assert_eq!(
                range.low() as i128,
                next,
                "ranges of {} overlap or leave a gap",
                bucket.location
            );
            next = range.high() as i128 + 1;
        }
        assert_eq!(next, bucket.range.high() as i128 + 1);
    }
}
