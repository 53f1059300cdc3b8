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

//! Join split descriptors handed to the execution framework.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::range::KeyRange;

/// A bucket of the first input scanned by a join split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitBucket {
    /// Storage location of the physical bucket
    pub location: String,
    /// Number of bytes to read
    pub length: u64,
    /// Key ranges of the bucket owned by this split, ordered and disjoint.
    /// Records outside these ranges belong to another split.
    pub ranges: Vec<KeyRange>,
}

/// One unit of distributed join work: a scan over some buckets of the first
/// input joined against the data of the second input matching `range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSplit {
    pub split_id: usize,
    /// Buckets of the first input, ordered by location
    pub buckets: Vec<SplitBucket>,
    /// Merged key range used to fetch the matching data of the second input
    pub range: KeyRange,
    /// Estimated bytes scanned from the first input
    pub size_a: u64,
    /// Estimated bytes of the second input matched by `range`
    pub size_b: u64,
}

impl JoinSplit {
    /// `(location, length)` pairs of the first input's buckets
    pub fn locations(&self) -> Vec<(&str, u64)> {
        self.buckets
            .iter()
            .map(|b| (b.location.as_str(), b.length))
            .collect()
    }

    /// Estimated cost of the split, `size_a + size_b`
    pub fn cost(&self) -> u128 {
        self.size_a as u128 + self.size_b as u128
    }
}

impl fmt::Display for JoinSplit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "JoinSplit[id={}, buckets={}, range={}, sizeA={}, sizeB={}]",
            self.split_id,
            self.buckets.len(),
            self.range,
            self.size_a,
            self.size_b
        )
    }
}
