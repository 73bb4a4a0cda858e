//! Runtime loading of the native client library
//!
//! The library is opened with `dlopen` and only three symbols are resolved:
//! the selection implementation the `fdb_select_api_version` macro expands
//! to, the max-version query and the error-string lookup.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{NativeClient, NativeErrorCode};
use crate::error::{Error, Result};

type SelectApiVersionImplFn = unsafe extern "C" fn(c_int, c_int) -> c_int;
type GetMaxApiVersionFn = unsafe extern "C" fn() -> c_int;
type GetErrorFn = unsafe extern "C" fn(c_int) -> *const c_char;

/// Environment variable holding an explicit library path
pub const LIBRARY_PATH_ENV: &str = "APIGATE_NATIVE_LIBRARY";

/// Base name of the native client library
const LIBRARY_NAME: &str = "fdb_c";

/// Directories scanned when no explicit path is given
const SEARCH_DIRS: &[&str] = &[
    "/usr/lib",
    "/usr/lib64",
    "/usr/local/lib",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    "/usr/local/foundationdb/lib",
];

/// Native library loaded at runtime
pub struct DynamicLibrary {
    path: String,
    _library: libloading::Library,
    select_api_version_impl: SelectApiVersionImplFn,
    get_max_api_version: GetMaxApiVersionFn,
    get_error: GetErrorFn,
}

// The function pointers stay valid while `_library` is alive, and the native
// entry points are documented as callable from any thread.
unsafe impl Send for DynamicLibrary {}
unsafe impl Sync for DynamicLibrary {}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DynamicLibrary {
    /// Locate and load the native library.
    ///
    /// Search order:
    /// 1. `explicit`, when given
    /// 2. `APIGATE_NATIVE_LIBRARY`
    /// 3. Well-known directories
    /// 4. `LD_LIBRARY_PATH` directories
    /// 5. The platform loader's default search
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            // an explicit path is authoritative
            return Self::load_from(path);
        }

        if let Ok(env_path) = std::env::var(LIBRARY_PATH_ENV) {
            match Self::load_from(Path::new(&env_path)) {
                Ok(lib) => return Ok(lib),
                Err(e) => warn!("{LIBRARY_PATH_ENV}={env_path} set but failed: {e}"),
            }
        }

        let file_name = libloading::library_filename(LIBRARY_NAME);

        let ld_dirs: Vec<String> = std::env::var("LD_LIBRARY_PATH")
            .map(|v| {
                v.split(':')
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let candidates = SEARCH_DIRS
            .iter()
            .map(|d| d.to_string())
            .chain(ld_dirs)
            .map(|d| PathBuf::from(d).join(&file_name))
            .filter(|p| p.exists());

        for path in candidates {
            match Self::load_from(&path) {
                Ok(lib) => return Ok(lib),
                Err(e) => debug!("Found {} but failed: {e}", path.display()),
            }
        }

        Self::load_from(Path::new(&file_name)).map_err(|e| {
            Error::linkage(
                format!(
                    "{} not found; set {} to the library path",
                    file_name.to_string_lossy(),
                    LIBRARY_PATH_ENV
                ),
                Some(anyhow::Error::new(e)),
            )
        })
    }

    /// Load a specific library file and resolve the selection symbols
    pub fn load_from(path: &Path) -> Result<Self> {
        let shown = path.display().to_string();

        // Safety: loading the vendor's client library, whose initializers
        // have no preconditions.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|e| Error::linkage(format!("dlopen {shown}: {e}"), None))?;

        let select_api_version_impl =
            unsafe { resolve::<SelectApiVersionImplFn>(&library, b"fdb_select_api_version_impl\0") }?;
        let get_max_api_version =
            unsafe { resolve::<GetMaxApiVersionFn>(&library, b"fdb_get_max_api_version\0") }?;
        let get_error = unsafe { resolve::<GetErrorFn>(&library, b"fdb_get_error\0") }?;

        info!(path = %shown, "Loaded native client library");

        Ok(Self {
            path: shown,
            _library: library,
            select_api_version_impl,
            get_max_api_version,
            get_error,
        })
    }
}

/// Copy a function pointer out of the library.
///
/// # Safety
/// `T` must match the symbol's real signature.
unsafe fn resolve<T: Copy>(library: &libloading::Library, name: &[u8]) -> Result<T> {
    let symbol: libloading::Symbol<'_, T> = library.get(name).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name)).into_owned();
        Error::linkage(format!("symbol {printable}: {e}"), None)
    })?;
    Ok(*symbol)
}

impl NativeClient for DynamicLibrary {
    fn select_api_version_impl(
        &self,
        runtime_version: i32,
        header_version: i32,
    ) -> Result<NativeErrorCode> {
        let code = unsafe { (self.select_api_version_impl)(runtime_version, header_version) };
        Ok(NativeErrorCode(code))
    }

    fn max_api_version(&self) -> Result<i32> {
        Ok(unsafe { (self.get_max_api_version)() })
    }

    fn describe_error(&self, code: NativeErrorCode) -> String {
        let ptr = unsafe { (self.get_error)(code.0) };
        if ptr.is_null() {
            return code.fallback_description().to_string();
        }
        // Safety: the library returns pointers to static, NUL-terminated strings
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}
