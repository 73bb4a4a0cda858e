//! In-process stand-in for the native library
//!
//! Behaves like the real selection entry point: it validates the runtime
//! version against its own range and the header version, and refuses a
//! second registration with `API_VERSION_ALREADY_SET`. Every registration
//! attempt is counted so callers can observe how often the gate reached it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::trace;

use super::{NativeClient, NativeErrorCode};
use crate::error::{Error, Result};
use crate::version::VersionRange;

/// Simulated native client with a registration counter
#[derive(Debug)]
pub struct SimulatedClient {
    supported: VersionRange,
    calls: AtomicUsize,
    selected: Mutex<Option<i32>>,
    linkage_failure: Option<String>,
}

impl SimulatedClient {
    /// Accept versions in `supported`
    pub fn new(supported: VersionRange) -> Self {
        Self {
            supported,
            calls: AtomicUsize::new(0),
            selected: Mutex::new(None),
            linkage_failure: None,
        }
    }

    /// A client whose every call fails as if the library were missing
    pub fn unlinked(message: impl Into<String>) -> Self {
        Self {
            linkage_failure: Some(message.into()),
            ..Self::new(VersionRange::default())
        }
    }

    /// Number of registration attempts received so far
    pub fn registration_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Version this client has accepted, if any
    pub fn registered_version(&self) -> Option<i32> {
        *self
            .selected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Mark a version as selected without going through a gate
    pub fn preselect(&self, version: i32) {
        *self
            .selected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(version);
    }

    fn check_linked(&self) -> Result<()> {
        match &self.linkage_failure {
            Some(message) => Err(Error::linkage(message.clone(), None)),
            None => Ok(()),
        }
    }
}

impl NativeClient for SimulatedClient {
    fn select_api_version_impl(
        &self,
        runtime_version: i32,
        header_version: i32,
    ) -> Result<NativeErrorCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_linked()?;

        let mut selected = self
            .selected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let code = if selected.is_some() {
            NativeErrorCode::API_VERSION_ALREADY_SET
        } else if runtime_version > header_version {
            NativeErrorCode::API_VERSION_INVALID
        } else if header_version > self.supported.max || !self.supported.contains(runtime_version) {
            NativeErrorCode::API_VERSION_NOT_SUPPORTED
        } else {
            *selected = Some(runtime_version);
            NativeErrorCode::SUCCESS
        };

        trace!(runtime_version, header_version, code = code.0, "simulated selection");
        Ok(code)
    }

    fn max_api_version(&self) -> Result<i32> {
        self.check_linked()?;
        Ok(self.supported.max)
    }
}
