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
//

//! Command line configuration of the planner binary

use std::collections::HashMap;

use hyperjoin_core::config::{
    HyperJoinConfig, HYPERJOIN_MAX_HASH_TABLE_SIZE, HYPERJOIN_MAX_PARTITION_SIZE,
    HYPERJOIN_MIN_SPLITS, HYPERJOIN_PARALLEL_CANDIDATES, HYPERJOIN_RANGELET_COUNT,
    HYPERJOIN_RANGELET_POLICY,
};
use hyperjoin_core::error::Result;

/// Configuration of the application
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(
        long,
        help = "JSON catalog of the first join input, the side whose buckets are grouped into splits"
    )]
    pub catalog_a: String,
    #[arg(
        long,
        help = "JSON catalog of the second join input, the side built into an in-memory table"
    )]
    pub catalog_b: String,
    #[arg(long, help = "Minimum number of join splits")]
    pub min_splits: Option<u64>,
    #[arg(
        long,
        help = "Maximum bytes scanned plus bytes matched in the second input per split"
    )]
    pub max_partition_size: Option<u64>,
    #[arg(long, help = "Maximum bytes of the second input matched per split")]
    pub max_hash_table_size: Option<u64>,
    #[arg(
        long,
        default_value_t = String::from("equal-width"),
        help = "Rangelet policy, possible values: equal-width, bucket-boundaries, quantile. Default: equal-width"
    )]
    pub rangelet_policy: String,
    #[arg(long, default_value_t = 64, help = "Number of rangelets. Default: 64")]
    pub rangelet_count: u64,
    #[arg(
        long,
        help = "Path to a JSON file holding an array of join key samples, required by the quantile rangelet policy"
    )]
    pub key_samples: Option<String>,
    #[arg(long, default_value_t = false, help = "Score merge candidates in parallel")]
    pub parallel_candidates: bool,
    #[arg(
        short = 'o',
        long,
        help = "Write the plan to this file instead of stdout"
    )]
    pub output: Option<String>,
    #[arg(
        long,
        default_value_t = false,
        help = "Enable print thread ids and names in log file."
    )]
    pub print_thread_info: bool,
    #[arg(
        long,
        default_value_t = String::from("INFO"),
        help = "special log level for sub mod. link: https://docs.rs/env_logger/latest/env_logger/#enabling-logging. For example we want whole level is INFO but hyperjoin_planner is DEBUG"
    )]
    pub log_level_setting: String,
}

impl Config {
    /// Planner settings given on the command line; mandatory settings that
    /// were not given are left unset.
    pub fn hyperjoin_config(&self) -> Result<HyperJoinConfig> {
        let mut settings = HashMap::new();
        let optional = [
            (HYPERJOIN_MIN_SPLITS, self.min_splits),
            (HYPERJOIN_MAX_PARTITION_SIZE, self.max_partition_size),
            (HYPERJOIN_MAX_HASH_TABLE_SIZE, self.max_hash_table_size),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                settings.insert(name.to_string(), value.to_string());
            }
        }
        settings.insert(
            HYPERJOIN_RANGELET_POLICY.to_string(),
            self.rangelet_policy.clone(),
        );
        settings.insert(
            HYPERJOIN_RANGELET_COUNT.to_string(),
            self.rangelet_count.to_string(),
        );
        settings.insert(
            HYPERJOIN_PARALLEL_CANDIDATES.to_string(),
            self.parallel_candidates.to_string(),
        );
        HyperJoinConfig::with_settings(settings)
    }
}
