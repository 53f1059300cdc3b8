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

/// The current version of HyperJoin, derived from the Cargo package version.
pub const HYPERJOIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Physical storage buckets.
pub mod bucket;
/// Bucket catalogs of the join inputs and memoized size lookups.
pub mod catalog;
/// Configuration options for the split planner.
pub mod config;
/// Error types and result definitions for HyperJoin operations.
pub mod error;
/// Closed key ranges over the join key domain.
pub mod range;
/// Join split descriptors produced by the planner.
pub mod split;
