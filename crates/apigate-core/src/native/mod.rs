//! Seam between the gate and the native client library
//!
//! The gate only ever talks to the native library through [`NativeClient`].
//! Two implementations ship with the crate:
//! - [`DynamicLibrary`] loads the real shared library at runtime
//! - [`SimulatedClient`] is an in-process stand-in with a call counter

pub mod dynamic;
pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

pub use dynamic::DynamicLibrary;
pub use simulated::SimulatedClient;

/// Raw error code returned by the native library (`fdb_error_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeErrorCode(pub i32);

impl NativeErrorCode {
    pub const SUCCESS: Self = Self(0);
    /// Operation requires a selected API version
    pub const API_VERSION_UNSET: Self = Self(2200);
    /// API version may be set only once
    pub const API_VERSION_ALREADY_SET: Self = Self(2201);
    /// API version is not valid
    pub const API_VERSION_INVALID: Self = Self(2202);
    /// API version not supported by the loaded library
    pub const API_VERSION_NOT_SUPPORTED: Self = Self(2203);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Built-in description for the codes the gate knows about
    pub fn fallback_description(self) -> &'static str {
        match self {
            Self::SUCCESS => "Success",
            Self::API_VERSION_UNSET => "API version is not set",
            Self::API_VERSION_ALREADY_SET => "API version may be set only once",
            Self::API_VERSION_INVALID => "API version is not valid",
            Self::API_VERSION_NOT_SUPPORTED => "API version not supported",
            _ => "Unknown native error",
        }
    }
}

impl fmt::Display for NativeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry points of the native library the gate depends on
///
/// `Err` from any method means the call could not execute at all and is
/// always a linkage error. A native rejection is an `Ok` carrying a
/// non-zero code.
pub trait NativeClient: Send + Sync + fmt::Debug {
    /// Forward to the function the selection macro expands to
    fn select_api_version_impl(
        &self,
        runtime_version: i32,
        header_version: i32,
    ) -> Result<NativeErrorCode>;

    /// Highest API version the loaded library supports
    fn max_api_version(&self) -> Result<i32>;

    /// Human readable text for a native error code
    fn describe_error(&self, code: NativeErrorCode) -> String {
        code.fallback_description().to_string()
    }
}
