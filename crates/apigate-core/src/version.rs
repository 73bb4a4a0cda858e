//! API version numbers and supported ranges
//!
//! API versions are plain positive integers. A build of the native library
//! accepts a contiguous inclusive range of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Highest API version this build was compiled against.
///
/// This plays the role of the header constant the native selection macro
/// passes alongside the runtime version.
pub const HEADER_API_VERSION: i32 = 730;

/// Lowest API version the native library has ever accepted.
pub const MIN_API_VERSION: i32 = 13;

/// A validated, positive API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ApiVersion(i32);

impl ApiVersion {
    /// Wrap a raw version, rejecting zero and negative values
    pub fn new(raw: i32) -> Option<Self> {
        if raw > 0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// The raw integer passed across the native boundary
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for ApiVersion {
    type Error = String;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        ApiVersion::new(raw).ok_or_else(|| format!("API version must be positive, got {}", raw))
    }
}

impl From<ApiVersion> for i32 {
    fn from(v: ApiVersion) -> Self {
        v.0
    }
}

/// Inclusive range of API versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: i32,
    pub max: i32,
}

impl VersionRange {
    /// Create a range; `min` must not exceed `max`
    pub fn new(min: i32, max: i32) -> Result<Self, Error> {
        if min < 1 || min > max {
            return Err(Error::config(format!(
                "Invalid API version range [{}, {}]",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Check whether `version` lies inside the range
    pub fn contains(&self, version: i32) -> bool {
        version >= self.min && version <= self.max
    }

    /// Return a copy with the upper bound lowered to `max`
    pub fn capped_at(&self, max: i32) -> Self {
        Self {
            min: self.min,
            max: self.max.min(max).max(self.min),
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self {
            min: MIN_API_VERSION,
            max: HEADER_API_VERSION,
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    /// Parse `"13..=730"` or `"13-730"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (lo, hi) = s
            .split_once("..=")
            .or_else(|| s.split_once('-'))
            .ok_or_else(|| Error::config(format!("Invalid version range: {}", s)))?;

        let min = lo
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("Invalid lower bound: {}", lo)))?;
        let max = hi
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("Invalid upper bound: {}", hi)))?;

        Self::new(min, max)
    }
}
