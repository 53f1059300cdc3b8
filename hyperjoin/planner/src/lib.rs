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

#![doc = include_str!("../README.md")]

/// Merge candidate selection strategies.
pub mod candidate;
/// Command line configuration of the planner binary.
#[cfg(feature = "build-binary")]
pub mod config;
/// Partitions of virtual buckets and merge candidates.
pub mod partition;
/// The working set of partitions during clustering.
pub mod partition_set;
/// Top level join split planner.
pub mod planner;
/// Rangelet slicing policies.
pub mod slicer;
/// Virtual buckets confined to a single rangelet.
pub mod virtual_bucket;

/// Test utilities for planner testing.
#[cfg(test)]
pub mod test_utils;

pub use planner::{JoinPlan, JoinSplitPlanner, PlanMetrics, PlannerState};
