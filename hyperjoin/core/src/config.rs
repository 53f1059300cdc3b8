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

//! HyperJoin configuration

use std::collections::HashMap;
use std::fmt;
use std::result;
use std::str::FromStr;
use std::sync::LazyLock;

use datafusion::{
    arrow::datatypes::DataType, common::config_err, config::ConfigExtension,
    prelude::SessionConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::{HyperJoinError, Result};

/// lower bound on the number of join splits produced by the planner
pub const HYPERJOIN_MIN_SPLITS: &str = "hyperjoin.min_splits";
/// upper bound on the bytes scanned plus the bytes matched by one split
pub const HYPERJOIN_MAX_PARTITION_SIZE: &str = "hyperjoin.max_partition_size";
/// upper bound on the bytes of the second input matched by one split
pub const HYPERJOIN_MAX_HASH_TABLE_SIZE: &str = "hyperjoin.max_hash_table_size";
pub const HYPERJOIN_RANGELET_POLICY: &str = "hyperjoin.rangelet.policy";
pub const HYPERJOIN_RANGELET_COUNT: &str = "hyperjoin.rangelet.count";
/// score merge candidates on a thread pool, needs the `parallel` planner feature
pub const HYPERJOIN_PARALLEL_CANDIDATES: &str = "hyperjoin.parallel_candidates";

pub type ParseResult<T> = result::Result<T, String>;

static CONFIG_ENTRIES: LazyLock<HashMap<String, ConfigEntry>> = LazyLock::new(|| {
    let entries = vec![
        ConfigEntry::new(HYPERJOIN_MIN_SPLITS.to_string(),
                         "Minimum number of join splits; clustering stops once the partition count reaches it".to_string(),
                         DataType::UInt64, None),
        ConfigEntry::new(HYPERJOIN_MAX_PARTITION_SIZE.to_string(),
                         "Maximum bytes scanned from the first input plus bytes matched in the second input per split".to_string(),
                         DataType::UInt64, None),
        ConfigEntry::new(HYPERJOIN_MAX_HASH_TABLE_SIZE.to_string(),
                         "Maximum bytes of the second input matched per split, bounding the in-memory build side".to_string(),
                         DataType::UInt64, None),
        ConfigEntry::new(HYPERJOIN_RANGELET_POLICY.to_string(),
                         "How the join key range is sliced into rangelets: equal-width, bucket-boundaries or quantile".to_string(),
                         DataType::Utf8,
                         Some(SlicingPolicy::EqualWidth.to_string())),
        ConfigEntry::new(HYPERJOIN_RANGELET_COUNT.to_string(),
                         "Number of rangelets for the equal-width and quantile policies".to_string(),
                         DataType::UInt64,
                         Some(64.to_string())),
        ConfigEntry::new(HYPERJOIN_PARALLEL_CANDIDATES.to_string(),
                         "Score merge candidates in parallel".to_string(),
                         DataType::Boolean,
                         Some((false).to_string())),
    ];
    entries
        .into_iter()
        .map(|e| (e.name.clone(), e))
        .collect::<HashMap<_, _>>()
});

/// Configuration option meta-data
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    name: String,
    description: String,
    data_type: DataType,
    default_value: Option<String>,
}

impl ConfigEntry {
    fn new(
        name: String,
        description: String,
        data_type: DataType,
        default_value: Option<String>,
    ) -> Self {
        Self {
            name,
            description,
            data_type,
            default_value,
        }
    }
}

/// HyperJoin configuration
///
/// Mandatory settings have no default; their absence is reported when a
/// [`PlannerConfig`] is derived, before any planning work starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HyperJoinConfig {
    /// Settings stored in map for easy serde
    settings: HashMap<String, String>,
}

impl HyperJoinConfig {
    /// Create a new configuration based on key-value pairs
    pub fn with_settings(settings: HashMap<String, String>) -> Result<Self> {
        for (name, value) in &settings {
            let entry = Self::valid_entries().get(name).ok_or_else(|| {
                HyperJoinError::Configuration(format!(
                    "configuration key `{name}` does not exist"
                ))
            })?;
            Self::parse_value(value.as_str(), entry.data_type.clone()).map_err(|e| HyperJoinError::Configuration(format!("Failed to parse user-supplied value '{value}' for configuration setting '{name}': {e}")))?;
        }

        Ok(Self { settings })
    }

    /// Returns a copy of this configuration with one more setting
    pub fn with_setting(&self, name: &str, value: impl Into<String>) -> Result<Self> {
        let mut settings = self.settings.clone();
        settings.insert(name.to_string(), value.into());
        Self::with_settings(settings)
    }

    /// Extracts the configuration registered as an extension of a DataFusion
    /// session config.
    pub fn from_session_config(config: &SessionConfig) -> Result<Self> {
        config
            .options()
            .extensions
            .get::<HyperJoinConfig>()
            .cloned()
            .ok_or_else(|| {
                HyperJoinError::Configuration(
                    "session config carries no hyperjoin settings".to_string(),
                )
            })
    }

    pub fn parse_value(val: &str, data_type: DataType) -> ParseResult<()> {
        match data_type {
            DataType::UInt64 => {
                val.parse::<u64>().map_err(|e| format!("{e:?}"))?;
            }
            DataType::Boolean => {
                val.parse::<bool>().map_err(|e| format!("{e:?}"))?;
            }
            DataType::Utf8 => {}
            _ => {
                return Err(format!("not support data type: {data_type}"));
            }
        }

        Ok(())
    }

    // All available configuration options
    pub fn valid_entries() -> &'static HashMap<String, ConfigEntry> {
        &CONFIG_ENTRIES
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    pub fn min_splits(&self) -> Option<u64> {
        self.get_u64_setting(HYPERJOIN_MIN_SPLITS)
    }

    pub fn max_partition_size(&self) -> Option<u64> {
        self.get_u64_setting(HYPERJOIN_MAX_PARTITION_SIZE)
    }

    pub fn max_hash_table_size(&self) -> Option<u64> {
        self.get_u64_setting(HYPERJOIN_MAX_HASH_TABLE_SIZE)
    }

    pub fn rangelet_policy(&self) -> Option<String> {
        self.get_string_setting(HYPERJOIN_RANGELET_POLICY)
    }

    pub fn rangelet_count(&self) -> Option<u64> {
        self.get_u64_setting(HYPERJOIN_RANGELET_COUNT)
    }

    pub fn parallel_candidates(&self) -> bool {
        self.get_setting(HYPERJOIN_PARALLEL_CANDIDATES)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false)
    }

    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).cloned().or_else(|| {
            Self::valid_entries()
                .get(key)
                .and_then(|entry| entry.default_value.clone())
        })
    }

    // values are validated in the constructor, so a failed parse means unset
    fn get_u64_setting(&self, key: &str) -> Option<u64> {
        self.get_setting(key).and_then(|v| v.parse().ok())
    }

    fn get_string_setting(&self, key: &str) -> Option<String> {
        self.get_setting(key)
    }
}

impl datafusion::config::ExtensionOptions for HyperJoinConfig {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn cloned(&self) -> Box<dyn datafusion::config::ExtensionOptions> {
        Box::new(self.clone())
    }

    fn set(&mut self, key: &str, value: &str) -> datafusion::error::Result<()> {
        let k = format!("{}.{key}", HyperJoinConfig::PREFIX);

        match Self::valid_entries().get(&k) {
            Some(entry) => {
                if let Err(e) = Self::parse_value(value, entry.data_type.clone()) {
                    return config_err!("invalid value `{value}` for `{k}`: {e}");
                }
                self.settings.insert(k, value.to_string());
                Ok(())
            }
            None => config_err!("configuration key `{}` does not exist", key),
        }
    }

    fn entries(&self) -> Vec<datafusion::config::ConfigEntry> {
        Self::valid_entries()
            .iter()
            .map(|(key, value)| datafusion::config::ConfigEntry {
                key: key.clone(),
                value: self
                    .settings
                    .get(key)
                    .cloned()
                    .or(value.default_value.clone()),
                description: &value.description,
            })
            .collect()
    }
}

impl datafusion::config::ConfigExtension for HyperJoinConfig {
    const PREFIX: &'static str = "hyperjoin";
}

/// How the overall join key range is divided into rangelets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlicingPolicy {
    /// equal width pieces of the key domain
    #[default]
    EqualWidth,
    /// cut at the bucket boundaries of the first input
    BucketBoundaries,
    /// cut at quantiles of a sample of join key values
    Quantile,
}

impl fmt::Display for SlicingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlicingPolicy::EqualWidth => write!(f, "equal-width"),
            SlicingPolicy::BucketBoundaries => write!(f, "bucket-boundaries"),
            SlicingPolicy::Quantile => write!(f, "quantile"),
        }
    }
}

impl FromStr for SlicingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equal-width" | "equal_width" => Ok(SlicingPolicy::EqualWidth),
            "bucket-boundaries" | "bucket_boundaries" => {
                Ok(SlicingPolicy::BucketBoundaries)
            }
            "quantile" => Ok(SlicingPolicy::Quantile),
            other => Err(format!("unknown rangelet policy: {other}")),
        }
    }
}

/// Validated planning parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Clustering never reduces the partition count below this floor
    pub min_splits: usize,
    /// Cap on `size_a + size_b` of a merged partition
    pub max_partition_size: u64,
    /// Cap on `size_b` of a merged partition
    pub max_hash_table_size: u64,
    pub slicing_policy: SlicingPolicy,
    pub rangelet_count: usize,
    pub parallel_candidates: bool,
}

impl PlannerConfig {
    pub fn new(min_splits: usize, max_partition_size: u64, max_hash_table_size: u64) -> Self {
        Self {
            min_splits,
            max_partition_size,
            max_hash_table_size,
            slicing_policy: SlicingPolicy::default(),
            rangelet_count: 64,
            parallel_candidates: false,
        }
    }

    pub fn with_slicing_policy(mut self, policy: SlicingPolicy) -> Self {
        self.slicing_policy = policy;
        self
    }

    pub fn with_rangelet_count(mut self, count: usize) -> Self {
        self.rangelet_count = count;
        self
    }

    pub fn with_parallel_candidates(mut self, parallel: bool) -> Self {
        self.parallel_candidates = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_splits < 1 {
            return Err(HyperJoinError::Configuration(format!(
                "{HYPERJOIN_MIN_SPLITS} must be at least 1, got {}",
                self.min_splits
            )));
        }
        if self.rangelet_count < 1 {
            return Err(HyperJoinError::Configuration(format!(
                "{HYPERJOIN_RANGELET_COUNT} must be at least 1, got {}",
                self.rangelet_count
            )));
        }
        Ok(())
    }
}

impl TryFrom<&HyperJoinConfig> for PlannerConfig {
    type Error = HyperJoinError;

    fn try_from(config: &HyperJoinConfig) -> Result<Self> {
        let mandatory = |name: &str, value: Option<u64>| {
            value.ok_or_else(|| {
                HyperJoinError::Configuration(format!(
                    "No value specified for mandatory configuration setting '{name}'"
                ))
            })
        };
        let to_usize = |name: &str, value: u64| {
            usize::try_from(value).map_err(|_| {
                HyperJoinError::Configuration(format!("'{name}' is out of range: {value}"))
            })
        };

        let min_splits = to_usize(
            HYPERJOIN_MIN_SPLITS,
            mandatory(HYPERJOIN_MIN_SPLITS, config.min_splits())?,
        )?;
        let max_partition_size =
            mandatory(HYPERJOIN_MAX_PARTITION_SIZE, config.max_partition_size())?;
        let max_hash_table_size =
            mandatory(HYPERJOIN_MAX_HASH_TABLE_SIZE, config.max_hash_table_size())?;
        let slicing_policy = config
            .rangelet_policy()
            .unwrap_or_default()
            .parse::<SlicingPolicy>()
            .map_err(HyperJoinError::Configuration)?;
        let rangelet_count = to_usize(
            HYPERJOIN_RANGELET_COUNT,
            mandatory(HYPERJOIN_RANGELET_COUNT, config.rangelet_count())?,
        )?;

        let planner_config =
            PlannerConfig::new(min_splits, max_partition_size, max_hash_table_size)
                .with_slicing_policy(slicing_policy)
                .with_rangelet_count(rangelet_count)
                .with_parallel_candidates(config.parallel_candidates());
        planner_config.validate()?;
        Ok(planner_config)
    }
}
