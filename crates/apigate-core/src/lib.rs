//! Apigate Core - one-shot API version negotiation for a native client library
//!
//! Every client of a versioned native library must select the API version it
//! was written against before making any other call. This crate provides the
//! gate that does it safely: the requested version is validated, registered
//! with the native library at most once per process, and every later request
//! is checked against the committed version.
//!
//! # Main Components
//!
//! - **Version Gate**: [`VersionGate`] guards the selection state
//! - **Native seam**: [`NativeClient`] with a runtime-loaded and a simulated implementation
//! - **Configuration**: [`GateConfig`] from the environment or JSON
//! - **Error Handling**: [`Error`] using `thiserror`, categorized by [`ErrorKind`]
//!
//! # Example
//!
//! ```no_run
//! use apigate_core::{select_api_version, Result};
//!
//! fn init() -> Result<()> {
//!     select_api_version(600)?;
//!     // the native library may be used from here on
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod native;
pub mod version;

use std::sync::OnceLock;

pub use config::{Backend, GateConfig};
pub use error::{Error, ErrorKind, Result};
pub use gate::{ProcessVersionState, VersionGate};
pub use native::{DynamicLibrary, NativeClient, NativeErrorCode, SimulatedClient};
pub use version::{ApiVersion, VersionRange, HEADER_API_VERSION, MIN_API_VERSION};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static GLOBAL_GATE: OnceLock<VersionGate> = OnceLock::new();

/// Install `gate` as the process-wide gate.
///
/// Fails with `Configuration` if the process-wide gate already exists,
/// either from an earlier install or from first use.
pub fn install_global_gate(gate: VersionGate) -> Result<()> {
    GLOBAL_GATE
        .set(gate)
        .map_err(|_| Error::config("The process-wide version gate is already initialized"))
}

/// The process-wide gate, built from [`GateConfig::from_env`] on first use
pub fn global_gate() -> Result<&'static VersionGate> {
    if let Some(gate) = GLOBAL_GATE.get() {
        return Ok(gate);
    }
    let gate = GateConfig::from_env()?.build_gate()?;
    // another thread may have won the race; its gate is the one kept
    let _ = GLOBAL_GATE.set(gate);
    GLOBAL_GATE
        .get()
        .ok_or_else(|| Error::config("The process-wide version gate could not be initialized"))
}

/// Select the API version for this process through the process-wide gate
pub fn select_api_version(requested: i32) -> Result<()> {
    global_gate()?.select_api_version(requested)
}

/// Version committed through the process-wide gate, if any
pub fn selected_api_version() -> Option<ApiVersion> {
    GLOBAL_GATE.get().and_then(VersionGate::selected_version)
}

/// Fail unless the process-wide gate has committed a version
pub fn ensure_selected() -> Result<ApiVersion> {
    match GLOBAL_GATE.get() {
        Some(gate) => gate.ensure_selected(),
        None => Err(Error::VersionNotSelected),
    }
}
