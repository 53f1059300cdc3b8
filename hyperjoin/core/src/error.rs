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

//! HyperJoin error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    io, result,
};

use datafusion::error::DataFusionError;

/// Result type alias for HyperJoin operations.
pub type Result<T> = result::Result<T, HyperJoinError>;

/// HyperJoin error types for join split planning.
///
/// Every variant is fatal for a planning run: the planner never returns a
/// partial set of splits.
#[derive(Debug)]
pub enum HyperJoinError {
    /// Invalid or missing planning parameters, detected before any work begins.
    Configuration(String),
    /// Bucket listings that cannot be planned over: ranges that do not
    /// decompose into rangelet-aligned pieces, or sizes that overflow.
    InconsistentRange(String),
    /// The second input's catalog could not answer a size lookup.
    LookupFailure(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
    /// Error from DataFusion operations.
    DataFusionError(Box<DataFusionError>),
    /// I/O operation error.
    IoError(io::Error),
    /// JSON (de)serialization error.
    JsonError(serde_json::Error),
}

impl From<DataFusionError> for HyperJoinError {
    fn from(e: DataFusionError) -> Self {
        match e {
            DataFusionError::External(e) if e.is::<HyperJoinError>() => {
                match e.downcast::<HyperJoinError>() {
                    Ok(e) => *e,
                    Err(e) => HyperJoinError::DataFusionError(Box::new(
                        DataFusionError::External(e),
                    )),
                }
            }
            other => HyperJoinError::DataFusionError(Box::new(other)),
        }
    }
}

impl From<io::Error> for HyperJoinError {
    fn from(e: io::Error) -> Self {
        HyperJoinError::IoError(e)
    }
}

impl From<serde_json::Error> for HyperJoinError {
    fn from(e: serde_json::Error) -> Self {
        HyperJoinError::JsonError(e)
    }
}

impl From<HyperJoinError> for DataFusionError {
    fn from(e: HyperJoinError) -> Self {
        match e {
            HyperJoinError::DataFusionError(e) => *e,
            HyperJoinError::Configuration(desc) => DataFusionError::Configuration(desc),
            other => DataFusionError::External(Box::new(other)),
        }
    }
}

impl Display for HyperJoinError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            HyperJoinError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            HyperJoinError::InconsistentRange(desc) => {
                write!(f, "Inconsistent range error: {desc}")
            }
            HyperJoinError::LookupFailure(desc) => {
                write!(f, "Size lookup failure: {desc}")
            }
            HyperJoinError::Internal(desc) => {
                write!(f, "Internal HyperJoin error: {desc}")
            }
            HyperJoinError::DataFusionError(desc) => {
                write!(f, "DataFusion error: {desc}")
            }
            HyperJoinError::IoError(desc) => write!(f, "IO error: {desc}"),
            HyperJoinError::JsonError(desc) => write!(f, "JSON error: {desc}"),
        }
    }
}

impl Error for HyperJoinError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_error_round_trips_through_datafusion() {
        let df_error: DataFusionError =
            HyperJoinError::LookupFailure("catalog offline".to_string()).into();
        let error = HyperJoinError::from(df_error);
        assert!(matches!(error, HyperJoinError::LookupFailure(_)));
        assert_eq!(error.to_string(), "Size lookup failure: catalog offline");
    }

    #[test]
    fn configuration_error_maps_to_datafusion_configuration() {
        let df_error: DataFusionError =
            HyperJoinError::Configuration("min_splits".to_string()).into();
        assert!(matches!(df_error, DataFusionError::Configuration(_)));
    }
}
