//! FFI API function definitions
//!
//! This module contains the extern "C" functions that form
//! the public API of the apigate FFI layer. All of them operate on the
//! process-wide gate.

use std::os::raw::{c_char, c_int};

use apigate_core::{GateConfig, ProcessVersionState, HEADER_API_VERSION};
use serde_json::json;

use crate::error::{map_core_error, validate_mut_ptr};
use crate::ffi_boundary;
use crate::memory::{allocate_string, c_str_to_string, clear_last_error, set_last_error};
use crate::types::ApigateResult;

/// Select the API version for this process.
///
/// This is the callable form of the native library's selection macro: the
/// header version the macro would pass is supplied by the gate. Call it once
/// during binding initialization, before any other native call. Repeating
/// the same version is harmless; a different version fails.
///
/// # Returns
/// - `Success` when `runtime_version` is (or already was) selected
/// - `UnsupportedVersion` when the version is outside the supported range;
///   `apigate_last_native_error` holds the native code
/// - `AlreadySelectedDifferentVersion` when another version was committed
/// - `NativeLinkageError` when the native library cannot be called; fatal
#[no_mangle]
pub extern "C" fn apigate_select_api_version(runtime_version: c_int) -> ApigateResult {
    ffi_boundary!({
        clear_last_error();
        apigate_core::select_api_version(runtime_version).map_err(map_core_error)?;
        Ok(ApigateResult::Success)
    })
}

/// Version selected in this process, or 0 when none is
#[no_mangle]
pub extern "C" fn apigate_selected_api_version() -> c_int {
    apigate_core::selected_api_version()
        .map(|v| v.get())
        .unwrap_or(0)
}

/// Succeeds only once an API version has been selected
#[no_mangle]
pub extern "C" fn apigate_ensure_selected() -> ApigateResult {
    ffi_boundary!({
        clear_last_error();
        apigate_core::ensure_selected().map_err(map_core_error)?;
        Ok(ApigateResult::Success)
    })
}

/// Header API version this build was compiled against
#[no_mangle]
pub extern "C" fn apigate_header_api_version() -> c_int {
    HEADER_API_VERSION
}

/// Query the highest API version the loaded native library supports
///
/// # Safety
/// `out_version` must point to writable memory for one `int`
#[no_mangle]
pub unsafe extern "C" fn apigate_max_api_version(out_version: *mut c_int) -> ApigateResult {
    ffi_boundary!({
        clear_last_error();
        validate_mut_ptr(out_version, "out_version")?;

        let gate = apigate_core::global_gate().map_err(map_core_error)?;
        let max = gate.max_supported_version().map_err(map_core_error)?;
        *out_version = max.get();

        Ok(ApigateResult::Success)
    })
}

/// Configure the process-wide gate from a JSON document.
///
/// Must be called before the first selection; afterwards the gate already
/// exists and `ConfigurationError` is returned. Recognized fields are
/// `backend` (`"native"` or `"simulated"`), `library_path`,
/// `header_version` and `simulated_range` (`{"min": .., "max": ..}`).
///
/// # Safety
/// `config_json` must be a valid null-terminated C string
#[no_mangle]
pub unsafe extern "C" fn apigate_configure(config_json: *const c_char) -> ApigateResult {
    ffi_boundary!({
        clear_last_error();
        let json = c_str_to_string(config_json)?;

        let gate = GateConfig::from_json(&json)
            .and_then(|config| config.build_gate())
            .map_err(map_core_error)?;
        apigate_core::install_global_gate(gate).map_err(map_core_error)?;

        Ok(ApigateResult::Success)
    })
}

/// Describe the process-wide gate as JSON
///
/// # Safety
/// `out_json` must be writable; the string written there must be freed with
/// `apigate_string_free`
#[no_mangle]
pub unsafe extern "C" fn apigate_describe_state(out_json: *mut *mut c_char) -> ApigateResult {
    ffi_boundary!({
        clear_last_error();
        validate_mut_ptr(out_json, "out_json")?;

        let gate = apigate_core::global_gate().map_err(map_core_error)?;
        let state = match gate.state() {
            ProcessVersionState::Unselected => json!({ "state": "unselected" }),
            ProcessVersionState::Selected(v) => json!({ "state": "selected", "version": v }),
            ProcessVersionState::LinkageFailed(message) => {
                json!({ "state": "linkage_failed", "error": message })
            }
        };
        let doc = json!({
            "gate": state,
            "supported_range": gate.supported_range(),
            "header_version": HEADER_API_VERSION,
            "library_version": apigate_core::VERSION,
        });

        let text = serde_json::to_string(&doc).map_err(|e| {
            set_last_error(format!("Failed to serialize state: {}", e));
            ApigateResult::InternalError
        })?;

        *out_json = allocate_string(&text);
        if (*out_json).is_null() {
            return Err(ApigateResult::InternalError);
        }

        Ok(ApigateResult::Success)
    })
}

/// Static description of a result code. Must NOT be freed.
#[no_mangle]
pub extern "C" fn apigate_result_message(code: c_int) -> *const c_char {
    match ApigateResult::from_code(code) {
        Some(result) => result.error_message_c().as_ptr() as *const c_char,
        None => b"Unknown result code\0".as_ptr() as *const c_char,
    }
}

/// Install a stderr tracing subscriber filtered by `RUST_LOG`.
///
/// Succeeds without effect when the host already installed one.
#[no_mangle]
pub extern "C" fn apigate_init_logging() -> ApigateResult {
    ffi_boundary!({
        crate::logging::init_logging();
        Ok(ApigateResult::Success)
    })
}

/// Library version string. Must NOT be freed.
#[no_mangle]
pub extern "C" fn apigate_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}
