//! Memory management and per-thread error state for FFI
//!
//! Failures record a message and the native error code in thread-local
//! storage so callers can inspect them after a non-success result.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::types::ApigateResult;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static LAST_NATIVE_ERROR: Cell<c_int> = const { Cell::new(0) };
}

/// Set the last error message for the current thread
pub fn set_last_error<S: Into<String>>(err: S) {
    let error_string = CString::new(err.into()).unwrap_or_else(|_| {
        CString::new("Error message contained null byte").unwrap_or_default()
    });

    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(error_string);
    });
}

/// Record the native error code of the current thread's last failure
pub fn set_last_native_error(code: c_int) {
    LAST_NATIVE_ERROR.with(|c| c.set(code));
}

/// Clear the last error message and native code
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
    LAST_NATIVE_ERROR.with(|c| c.set(0));
}

/// Allocate a new string for FFI return
///
/// # Safety
/// The caller must free this string using `apigate_string_free`
pub unsafe fn allocate_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => {
            set_last_error("String contains null byte");
            ptr::null_mut()
        }
    }
}

/// Free a string allocated by apigate
///
/// # Safety
/// The pointer must have been returned by an apigate function documented
/// as caller-owned
#[no_mangle]
pub unsafe extern "C" fn apigate_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }

    let _ = CString::from_raw(s);
}

/// Convert a C string to a Rust string
///
/// # Safety
/// The pointer must be a valid null-terminated C string
pub unsafe fn c_str_to_string(s: *const c_char) -> Result<String, ApigateResult> {
    if s.is_null() {
        set_last_error("String argument is null");
        return Err(ApigateResult::NullPointer);
    }

    match CStr::from_ptr(s).to_str() {
        Ok(str) => Ok(str.to_string()),
        Err(_) => {
            set_last_error("Invalid UTF-8 in input string");
            Err(ApigateResult::Utf8Error)
        }
    }
}

/// Get the last error message
///
/// # Safety
/// Returns a pointer that should NOT be freed by the caller. It stays valid
/// until the next apigate call on the same thread.
#[no_mangle]
pub unsafe extern "C" fn apigate_get_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(err) => err.as_ptr(),
        None => ptr::null(),
    })
}

/// Native error code of the current thread's last failure, or 0
#[no_mangle]
pub extern "C" fn apigate_last_native_error() -> c_int {
    LAST_NATIVE_ERROR.with(|c| c.get())
}

/// Clear the last error message
#[no_mangle]
pub extern "C" fn apigate_clear_error() {
    clear_last_error();
}
