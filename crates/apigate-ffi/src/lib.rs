//! Apigate FFI - C ABI for the API version gate
//!
//! Host-language bindings call [`apigate_select_api_version`] once during
//! their own initialization, before any other call into the native client
//! library. The native selection entry point is a preprocessor macro, so it
//! cannot be bound directly; this crate re-exposes it as an ordinary symbol
//! and adds the one-shot guarantees of `apigate-core` on top.
//!
//! # Safety
//!
//! Functions taking raw pointers are marked `unsafe`. Callers must ensure:
//! - Output pointers are writable
//! - Input strings are valid, null-terminated UTF-8
//! - Strings returned as caller-owned are freed with `apigate_string_free`
//!
//! Error messages and native codes are kept per thread; read them with
//! `apigate_get_last_error` and `apigate_last_native_error` right after a
//! failing call.

#![warn(missing_docs)]

#[macro_use]
mod error;
mod api;
mod logging;
mod memory;
mod types;

// Re-export public API
pub use api::*;
pub use memory::{
    apigate_clear_error, apigate_get_last_error, apigate_last_native_error, apigate_string_free,
};
pub use types::ApigateResult;

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(apigate_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_result_message() {
        let msg = unsafe { CStr::from_ptr(apigate_result_message(-2)) };
        assert_eq!(
            msg.to_str().unwrap(),
            "A different API version was already selected"
        );

        let msg = unsafe { CStr::from_ptr(apigate_result_message(42)) };
        assert_eq!(msg.to_str().unwrap(), "Unknown result code");
    }

    #[test]
    fn test_header_version() {
        assert_eq!(apigate_header_api_version(), apigate_core::HEADER_API_VERSION);
    }
}
