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

use dashmap::DashMap;

use crate::catalog::BucketCatalog;
use crate::error::Result;
use crate::range::KeyRange;

/// Size lookups against the second join input, memoized per key range.
///
/// The catalog is an immutable snapshot for the duration of planning, so a
/// memoized size is always equal to a fresh lookup over the same range. The
/// cache is safe to share between threads scoring merge candidates.
#[derive(Debug)]
pub struct SizeLookup {
    catalog: Arc<dyn BucketCatalog>,
    cache: DashMap<KeyRange, u64>,
}

impl SizeLookup {
    pub fn new(catalog: Arc<dyn BucketCatalog>) -> Self {
        Self {
            catalog,
            cache: DashMap::new(),
        }
    }

    /// Total size of the buckets of the second input intersecting `range`.
    ///
    /// Failures of the underlying catalog are returned, never replaced by a
    /// default size.
    pub fn lookup(&self, range: &KeyRange) -> Result<u64> {
        if let Some(size) = self.cache.get(range) {
            return Ok(*size);
        }
        let size = self.catalog.overlapping_size(range)?;
        self.cache.insert(*range, size);
        Ok(size)
    }

    pub fn catalog(&self) -> &Arc<dyn BucketCatalog> {
        &self.catalog
    }

    /// Number of distinct ranges looked up so far
    pub fn cached_ranges(&self) -> usize {
        self.cache.len()
    }
}
