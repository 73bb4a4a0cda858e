//! Error handling for FFI boundary
//!
//! This module provides utilities for safely propagating errors
//! across the FFI boundary without panics or undefined behavior.

use std::any::Any;
use std::panic;

use crate::memory::{set_last_error, set_last_native_error};
use crate::types::ApigateResult;

/// Convert a core error to an FFI result code, recording its message and
/// native code for the calling thread
pub fn map_core_error(error: apigate_core::Error) -> ApigateResult {
    set_last_error(error.to_string());
    set_last_native_error(error.native_code().map(|c| c.0).unwrap_or(0));
    ApigateResult::from(error.kind())
}

/// Safely execute a closure that might panic
///
/// This function catches any panics and converts them to appropriate
/// error codes, preventing undefined behavior at the FFI boundary.
pub fn catch_panic<F, R>(f: F) -> Result<R, ApigateResult>
where
    F: FnOnce() -> Result<R, ApigateResult> + panic::UnwindSafe,
{
    match panic::catch_unwind(f) {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = get_panic_message(&panic_info);
            set_last_error(format!("Panic occurred: {}", msg));
            Err(ApigateResult::InternalError)
        }
    }
}

/// Extract a message from panic info
fn get_panic_message(panic_info: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

/// Macro for safely executing FFI functions
#[macro_export]
macro_rules! ffi_boundary {
    ($body:expr) => {{
        match $crate::error::catch_panic(|| $body) {
            Ok(result) => result,
            Err(code) => return code,
        }
    }};
}

/// Validate that a mutable pointer is not null
pub fn validate_mut_ptr<T>(ptr: *mut T, name: &str) -> Result<(), ApigateResult> {
    if ptr.is_null() {
        set_last_error(format!("{} is null", name));
        Err(ApigateResult::NullPointer)
    } else {
        Ok(())
    }
}
