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

//! Closed key ranges over the join key domain.

use std::fmt;

use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};

use crate::error::{HyperJoinError, Result};

/// A closed interval `[low, high]` of join key values.
///
/// A range is empty when `low > high`. Ranges are plain values: every
/// operation returns a new range and never mutates its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    low: i64,
    high: i64,
}

impl KeyRange {
    /// Creates the closed range `[low, high]`, empty if `low > high`.
    pub const fn closed(low: i64, high: i64) -> Self {
        if low > high {
            Self::empty()
        } else {
            Self { low, high }
        }
    }

    /// The canonical empty range.
    pub const fn empty() -> Self {
        Self {
            low: i64::MAX,
            high: i64::MIN,
        }
    }

    /// Builds a range from two DataFusion scalars holding the lower and upper
    /// bound, e.g. the min/max statistics of a join key column.
    pub fn try_from_scalars(low: &ScalarValue, high: &ScalarValue) -> Result<Self> {
        Ok(Self::closed(scalar_to_key(low)?, scalar_to_key(high)?))
    }

    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    /// Number of keys in the range.
    pub fn width(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.high as i128 - self.low as i128 + 1).min(u64::MAX as i128) as u64
        }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &KeyRange) -> KeyRange {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        KeyRange::closed(self.low.min(other.low), self.high.max(other.high))
    }

    pub fn intersect(&self, other: &KeyRange) -> KeyRange {
        KeyRange::closed(self.low.max(other.low), self.high.min(other.high))
    }

    pub fn intersects(&self, other: &KeyRange) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.low <= key && key <= self.high
    }

    /// True if every key of `other` is in `self`. The empty range is
    /// contained in every range.
    pub fn contains(&self, other: &KeyRange) -> bool {
        other.is_empty() || (self.low <= other.low && other.high <= self.high)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[]")
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}

fn scalar_to_key(value: &ScalarValue) -> Result<i64> {
    let key = match value {
        ScalarValue::Int8(Some(v)) => Some(*v as i64),
        ScalarValue::Int16(Some(v)) => Some(*v as i64),
        ScalarValue::Int32(Some(v)) => Some(*v as i64),
        ScalarValue::Int64(Some(v)) => Some(*v),
        ScalarValue::UInt8(Some(v)) => Some(*v as i64),
        ScalarValue::UInt16(Some(v)) => Some(*v as i64),
        ScalarValue::UInt32(Some(v)) => Some(*v as i64),
        ScalarValue::UInt64(Some(v)) => i64::try_from(*v).ok(),
        ScalarValue::Date32(Some(v)) => Some(*v as i64),
        ScalarValue::Date64(Some(v)) => Some(*v),
        ScalarValue::TimestampSecond(Some(v), _)
        | ScalarValue::TimestampMillisecond(Some(v), _)
        | ScalarValue::TimestampMicrosecond(Some(v), _)
        | ScalarValue::TimestampNanosecond(Some(v), _) => Some(*v),
        _ => None,
    };
    key.ok_or_else(|| {
        HyperJoinError::Configuration(format!(
            "join key value {value:?} cannot be used as a range bound"
        ))
    })
}
