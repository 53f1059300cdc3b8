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

//! Catalogs built from DataFusion file listings.

use datafusion::common::stats::Precision;
use datafusion::datasource::listing::PartitionedFile;
use object_store::ObjectMeta;

use crate::bucket::PhysicalBucket;
use crate::catalog::InMemoryBucketCatalog;
use crate::error::{HyperJoinError, Result};
use crate::range::KeyRange;

impl InMemoryBucketCatalog {
    /// Builds a catalog with one bucket per file, taking each bucket's key
    /// range from the exact min/max statistics of the join key column.
    pub fn try_from_files(
        input_id: impl Into<String>,
        files: &[PartitionedFile],
        key_column: usize,
    ) -> Result<Self> {
        let buckets = files
            .iter()
            .map(|file| {
                let range = key_range_from_statistics(file, key_column)?;
                Ok(bucket_from_meta(&file.object_meta, range))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(input_id, buckets)
    }
}

fn bucket_from_meta(meta: &ObjectMeta, range: KeyRange) -> PhysicalBucket {
    PhysicalBucket::new(meta.location.to_string(), meta.size, range)
}

fn key_range_from_statistics(file: &PartitionedFile, key_column: usize) -> Result<KeyRange> {
    let location = &file.object_meta.location;
    let column = file
        .statistics
        .as_ref()
        .and_then(|stats| stats.column_statistics.get(key_column))
        .ok_or_else(|| {
            HyperJoinError::InconsistentRange(format!(
                "file {location} has no statistics for join key column {key_column}"
            ))
        })?;

    match (&column.min_value, &column.max_value) {
        (Precision::Exact(min), Precision::Exact(max)) => {
            KeyRange::try_from_scalars(min, max)
        }
        _ => Err(HyperJoinError::InconsistentRange(format!(
            "file {location} has no exact min/max for join key column {key_column}"
        ))),
    }
}
