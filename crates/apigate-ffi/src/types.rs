//! FFI-safe type definitions
//!
//! All types in this module are designed to be safely passed across
//! the FFI boundary with C ABI compatibility.

use apigate_core::ErrorKind;

/// Result codes for FFI operations
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApigateResult {
    /// Operation completed successfully
    Success = 0,
    /// Requested API version is outside the supported range
    UnsupportedVersion = -1,
    /// A different API version was already selected in this process
    AlreadySelectedDifferentVersion = -2,
    /// The native library could not be called; fatal
    NativeLinkageError = -3,
    /// No API version has been selected yet
    VersionNotSelected = -4,
    /// Invalid gate configuration
    ConfigurationError = -5,
    /// Internal error
    InternalError = -9,
    /// Invalid UTF-8 string
    Utf8Error = -11,
    /// Null pointer provided
    NullPointer = -12,
}

impl ApigateResult {
    /// Map a raw code received from C back to a result
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ApigateResult::Success,
            -1 => ApigateResult::UnsupportedVersion,
            -2 => ApigateResult::AlreadySelectedDifferentVersion,
            -3 => ApigateResult::NativeLinkageError,
            -4 => ApigateResult::VersionNotSelected,
            -5 => ApigateResult::ConfigurationError,
            -9 => ApigateResult::InternalError,
            -11 => ApigateResult::Utf8Error,
            -12 => ApigateResult::NullPointer,
            _ => return None,
        })
    }

    /// Get a human-readable error message
    pub fn error_message(self) -> &'static str {
        match self {
            ApigateResult::Success => "Success",
            ApigateResult::UnsupportedVersion => "API version not supported",
            ApigateResult::AlreadySelectedDifferentVersion => {
                "A different API version was already selected"
            }
            ApigateResult::NativeLinkageError => "Native library could not be called",
            ApigateResult::VersionNotSelected => "No API version selected",
            ApigateResult::ConfigurationError => "Invalid configuration",
            ApigateResult::InternalError => "Internal error",
            ApigateResult::Utf8Error => "Invalid UTF-8 string",
            ApigateResult::NullPointer => "Null pointer provided",
        }
    }

    /// Same text as [`error_message`](Self::error_message), NUL-terminated
    pub(crate) fn error_message_c(self) -> &'static [u8] {
        match self {
            ApigateResult::Success => b"Success\0",
            ApigateResult::UnsupportedVersion => b"API version not supported\0",
            ApigateResult::AlreadySelectedDifferentVersion => {
                b"A different API version was already selected\0"
            }
            ApigateResult::NativeLinkageError => b"Native library could not be called\0",
            ApigateResult::VersionNotSelected => b"No API version selected\0",
            ApigateResult::ConfigurationError => b"Invalid configuration\0",
            ApigateResult::InternalError => b"Internal error\0",
            ApigateResult::Utf8Error => b"Invalid UTF-8 string\0",
            ApigateResult::NullPointer => b"Null pointer provided\0",
        }
    }
}

impl From<ErrorKind> for ApigateResult {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::UnsupportedVersion => ApigateResult::UnsupportedVersion,
            ErrorKind::AlreadySelectedDifferentVersion => {
                ApigateResult::AlreadySelectedDifferentVersion
            }
            ErrorKind::NativeLinkageError => ApigateResult::NativeLinkageError,
            ErrorKind::VersionNotSelected => ApigateResult::VersionNotSelected,
            ErrorKind::Configuration => ApigateResult::ConfigurationError,
        }
    }
}
