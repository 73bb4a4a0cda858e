//! Error types for the version gate
//!
//! Every failure of the gate is a caller configuration problem or a broken
//! native linkage. Nothing here is retried internally.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::native::NativeErrorCode;
use crate::version::{ApiVersion, VersionRange};

/// Main error type for gate operations
#[derive(Error, Debug)]
pub enum Error {
    /// The requested version is outside the supported range
    #[error("API version {requested} is not supported: {message} (native error {code})")]
    UnsupportedVersion {
        requested: i32,
        code: NativeErrorCode,
        message: String,
    },

    /// A different version was committed earlier in the process
    #[error("{}", already_selected_message(.requested, .selected))]
    AlreadySelectedDifferentVersion {
        requested: i32,
        /// `None` when the version was selected outside this gate
        selected: Option<ApiVersion>,
    },

    /// The native entry point could not be executed at all
    #[error("Native linkage error: {message}")]
    NativeLinkage {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A guarded operation ran before any version was selected
    #[error("No API version has been selected yet")]
    VersionNotSelected,

    /// Invalid gate configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

fn already_selected_message(requested: &i32, selected: &Option<ApiVersion>) -> String {
    match selected {
        Some(v) => format!(
            "API version {} already selected, cannot select {}",
            v, requested
        ),
        None => format!(
            "API version already selected outside this gate, cannot select {}",
            requested
        ),
    }
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Distinguishable error category reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedVersion,
    AlreadySelectedDifferentVersion,
    NativeLinkageError,
    VersionNotSelected,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnsupportedVersion => write!(f, "UnsupportedVersion"),
            ErrorKind::AlreadySelectedDifferentVersion => {
                write!(f, "AlreadySelectedDifferentVersion")
            }
            ErrorKind::NativeLinkageError => write!(f, "NativeLinkageError"),
            ErrorKind::VersionNotSelected => write!(f, "VersionNotSelected"),
            ErrorKind::Configuration => write!(f, "Configuration"),
        }
    }
}

impl Error {
    /// Build an `UnsupportedVersion` error from a native rejection
    pub fn unsupported(requested: i32, code: NativeErrorCode, message: impl Into<String>) -> Self {
        Error::UnsupportedVersion {
            requested,
            code,
            message: message.into(),
        }
    }

    /// Build an `UnsupportedVersion` error for a version outside `range`
    pub fn out_of_range(requested: i32, range: VersionRange) -> Self {
        Error::unsupported(
            requested,
            NativeErrorCode::API_VERSION_INVALID,
            format!("expected a version in {}", range),
        )
    }

    /// Build a linkage error with an optional source
    pub fn linkage(message: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Error::NativeLinkage {
            message: message.into(),
            source,
        }
    }

    /// Build a configuration error without a source
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Error::AlreadySelectedDifferentVersion { .. } => {
                ErrorKind::AlreadySelectedDifferentVersion
            }
            Error::NativeLinkage { .. } => ErrorKind::NativeLinkageError,
            Error::VersionNotSelected => ErrorKind::VersionNotSelected,
            Error::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Native error code associated with this error, if any
    pub fn native_code(&self) -> Option<NativeErrorCode> {
        match self {
            Error::UnsupportedVersion { code, .. } => Some(*code),
            Error::AlreadySelectedDifferentVersion { .. } => {
                Some(NativeErrorCode::API_VERSION_ALREADY_SET)
            }
            Error::VersionNotSelected => Some(NativeErrorCode::API_VERSION_UNSET),
            Error::NativeLinkage { .. } | Error::Configuration { .. } => None,
        }
    }

    /// The message without the category prefix added by `Display`
    pub fn detail(&self) -> String {
        match self {
            Error::NativeLinkage { message, .. } | Error::Configuration { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    /// Whether the wrapped library is unusable for the rest of the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::NativeLinkage { .. })
    }

    /// Gate errors are never retryable; the caller must fix its configuration.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
