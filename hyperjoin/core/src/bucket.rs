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

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::range::KeyRange;

/// A physical storage bucket produced by the upstream storage layer.
///
/// Buckets are read-only to the planner and shared as `Arc<PhysicalBucket>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalBucket {
    /// Storage location, unique within a catalog
    pub location: String,
    /// Size of the bucket in bytes
    pub size: u64,
    /// Join key range of the records stored in the bucket
    pub range: KeyRange,
}

impl PhysicalBucket {
    pub fn new(location: impl Into<String>, size: u64, range: KeyRange) -> Self {
        Self {
            location: location.into(),
            size,
            range,
        }
    }
}

impl fmt::Display for PhysicalBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes, keys {})", self.location, self.size, self.range)
    }
}
