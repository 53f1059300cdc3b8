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

use std::sync::Arc;

use hyperjoin_core::bucket::PhysicalBucket;
use hyperjoin_core::catalog::{BucketCatalog, InMemoryBucketCatalog};
use hyperjoin_core::error::{HyperJoinError, Result};
use hyperjoin_core::range::KeyRange;

use crate::virtual_bucket::VirtualBucket;

/// Builds an in-memory catalog from `(location, size, low, high)` tuples.
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

/// A virtual bucket covering the whole key range of its physical bucket.
pub fn vbucket(
    location: &str,
    size: u64,
    low: i64,
    high: i64,
    rangelet: usize,
) -> VirtualBucket {
    let range = KeyRange::closed(low, high);
    VirtualBucket::new(
        Arc::new(PhysicalBucket::new(location, size, range)),
        range,
        rangelet,
    )
}

/// A catalog whose size lookups always fail.
pub fn failing_catalog() -> Arc<dyn BucketCatalog> {
    Arc::new(FailingCatalog)
}

#[derive(Debug)]
struct FailingCatalog;

impl BucketCatalog for FailingCatalog {
    fn input_id(&self) -> &str {
        "failing"
    }

    fn buckets(&self) -> Result<Vec<Arc<PhysicalBucket>>> {
        Err(HyperJoinError::LookupFailure("catalog unavailable".to_string()))
    }

    fn full_range(&self) -> Result<KeyRange> {
        Err(HyperJoinError::LookupFailure("catalog unavailable".to_string()))
    }

    fn overlapping_size(&self, _range: &KeyRange) -> Result<u64> {
        Err(HyperJoinError::LookupFailure("catalog unavailable".to_string()))
    }
}
