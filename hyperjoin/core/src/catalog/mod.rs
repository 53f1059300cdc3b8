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

//! Bucket catalogs of the two join inputs.
//!
//! A catalog is an immutable snapshot of the buckets of one join input. The
//! planner lists the buckets of the first input and queries the second input
//! by key range to estimate the size of the in-memory build side.

use std::collections::HashSet;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::bucket::PhysicalBucket;
use crate::error::{HyperJoinError, Result};
use crate::range::KeyRange;

mod files;
mod lookup;

pub use lookup::SizeLookup;

/// Read-only access to the bucket listing of one join input.
pub trait BucketCatalog: Debug + Send + Sync {
    /// Identifier of the join input this catalog describes
    fn input_id(&self) -> &str;

    /// All buckets of the input, ordered by the start of their key range
    fn buckets(&self) -> Result<Vec<Arc<PhysicalBucket>>>;

    /// Smallest key range covering every bucket of the input
    fn full_range(&self) -> Result<KeyRange>;

    /// Total size in bytes of the buckets whose key range intersects `range`
    fn overlapping_size(&self, range: &KeyRange) -> Result<u64>;
}

/// A [`BucketCatalog`] over an in-memory list of buckets.
#[derive(Debug, Clone)]
pub struct InMemoryBucketCatalog {
    input_id: String,
    /// sorted by (low, high, location)
    buckets: Vec<Arc<PhysicalBucket>>,
    full_range: KeyRange,
}

impl InMemoryBucketCatalog {
    /// Creates a catalog, rejecting buckets without a key range, duplicate
    /// storage locations and listings whose total size overflows `u64`.
    pub fn try_new(
        input_id: impl Into<String>,
        buckets: Vec<PhysicalBucket>,
    ) -> Result<Self> {
        let input_id = input_id.into();
        let mut locations = HashSet::with_capacity(buckets.len());
        for bucket in &buckets {
            if bucket.range.is_empty() {
                return Err(HyperJoinError::InconsistentRange(format!(
                    "bucket {} of input {input_id} has an empty key range",
                    bucket.location
                )));
            }
            if !locations.insert(bucket.location.as_str()) {
                return Err(HyperJoinError::InconsistentRange(format!(
                    "bucket location {} appears more than once in input {input_id}",
                    bucket.location
                )));
            }
        }

        if buckets
            .iter()
            .try_fold(0u64, |acc, b| acc.checked_add(b.size))
            .is_none()
        {
            return Err(HyperJoinError::InconsistentRange(format!(
                "total size of the buckets of input {input_id} overflows"
            )));
        }

        let mut buckets: Vec<Arc<PhysicalBucket>> =
            buckets.into_iter().map(Arc::new).collect();
        buckets.sort_by(|a, b| {
            (a.range.low(), a.range.high(), &a.location).cmp(&(
                b.range.low(),
                b.range.high(),
                &b.location,
            ))
        });
        let full_range = buckets
            .iter()
            .fold(KeyRange::empty(), |acc, b| acc.union(&b.range));

        debug!(
            "catalog for input {input_id}: {} buckets covering {full_range}",
            buckets.len()
        );

        Ok(Self {
            input_id,
            buckets,
            full_range,
        })
    }

    /// Reads a catalog from a JSON array of buckets.
    pub fn from_json_reader<R: Read>(input_id: impl Into<String>, reader: R) -> Result<Self> {
        let buckets: Vec<PhysicalBucket> = serde_json::from_reader(reader)?;
        Self::try_new(input_id, buckets)
    }

    /// Reads a catalog from a JSON file, using the file path as the input id.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_json_reader(path.display().to_string(), BufReader::new(file))
    }

    /// Writes the bucket listing as a JSON array.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let buckets: Vec<&PhysicalBucket> =
            self.buckets.iter().map(|b| b.as_ref()).collect();
        serde_json::to_writer_pretty(writer, &buckets)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total size of all buckets in bytes
    pub fn total_size(&self) -> u64 {
        self.buckets.iter().map(|b| b.size).sum()
    }
}

impl BucketCatalog for InMemoryBucketCatalog {
    fn input_id(&self) -> &str {
        &self.input_id
    }

    fn buckets(&self) -> Result<Vec<Arc<PhysicalBucket>>> {
        Ok(self.buckets.clone())
    }

    fn full_range(&self) -> Result<KeyRange> {
        Ok(self.full_range)
    }

    fn overlapping_size(&self, range: &KeyRange) -> Result<u64> {
        if range.is_empty() {
            return Ok(0);
        }
        // buckets starting after the range cannot intersect it
        let end = self
            .buckets
            .partition_point(|b| b.range.low() <= range.high());
        self.buckets[..end]
            .iter()
            .filter(|b| b.range.high() >= range.low())
            .try_fold(0u64, |acc, b| {
                acc.checked_add(b.size).ok_or_else(|| {
                    HyperJoinError::LookupFailure(format!(
                        "size of input {} over {range} overflows",
                        self.input_id
                    ))
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Result<InMemoryBucketCatalog> {
        InMemoryBucketCatalog::try_new(
            "orders",
            vec![
                PhysicalBucket::new("b2", 20, KeyRange::closed(50, 99)),
                PhysicalBucket::new("b1", 10, KeyRange::closed(0, 49)),
                PhysicalBucket::new("b3", 40, KeyRange::closed(40, 120)),
            ],
        )
    }

    #[test]
    fn buckets_are_ordered_by_range_start() -> Result<()> {
        let catalog = catalog()?;
        let locations: Vec<String> = catalog
            .buckets()?
            .iter()
            .map(|b| b.location.clone())
            .collect();
        assert_eq!(locations, vec!["b1", "b3", "b2"]);
        assert_eq!(catalog.full_range()?, KeyRange::closed(0, 120));
        assert_eq!(catalog.total_size(), 70);
        Ok(())
    }

    #[test]
    fn overlapping_size_counts_each_intersecting_bucket_once() -> Result<()> {
        let catalog = catalog()?;
        assert_eq!(catalog.overlapping_size(&KeyRange::closed(0, 10))?, 10);
        assert_eq!(catalog.overlapping_size(&KeyRange::closed(45, 55))?, 70);
        assert_eq!(catalog.overlapping_size(&KeyRange::closed(100, 500))?, 40);
        assert_eq!(catalog.overlapping_size(&KeyRange::closed(121, 500))?, 0);
        assert_eq!(catalog.overlapping_size(&KeyRange::empty())?, 0);
        Ok(())
    }

    #[test]
    fn rejects_inconsistent_buckets() {
        let err = InMemoryBucketCatalog::try_new(
            "a",
            vec![PhysicalBucket::new("b1", 10, KeyRange::empty())],
        )
        .unwrap_err();
        assert!(matches!(err, HyperJoinError::InconsistentRange(_)));

        let err = InMemoryBucketCatalog::try_new(
            "a",
            vec![
                PhysicalBucket::new("b1", 10, KeyRange::closed(0, 1)),
                PhysicalBucket::new("b1", 10, KeyRange::closed(2, 3)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, HyperJoinError::InconsistentRange(_)));
    }

    #[test]
    fn overflowing_total_size_is_rejected() -> Result<()> {
        let half = u64::MAX / 2 + 1;
        let err = InMemoryBucketCatalog::try_new(
            "a",
            vec![
                PhysicalBucket::new("a1", half, KeyRange::closed(0, 1)),
                PhysicalBucket::new("a2", half, KeyRange::closed(2, 3)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, HyperJoinError::InconsistentRange(_)));

        let catalog = InMemoryBucketCatalog::try_new(
            "a",
            vec![
                PhysicalBucket::new("a1", u64::MAX - 5, KeyRange::closed(0, 1)),
                PhysicalBucket::new("a2", 5, KeyRange::closed(2, 3)),
            ],
        )?;
        assert_eq!(catalog.total_size(), u64::MAX);
        assert_eq!(catalog.overlapping_size(&KeyRange::closed(0, 3))?, u64::MAX);
        Ok(())
    }

    #[test]
    fn json_round_trip_through_a_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("orders.json");
        catalog()?.write_json(File::create(&path)?)?;

        let loaded = InMemoryBucketCatalog::from_json_file(&path)?;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.input_id(), path.display().to_string());
        assert_eq!(loaded.overlapping_size(&KeyRange::closed(45, 55))?, 70);
        Ok(())
    }
}
