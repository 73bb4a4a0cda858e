//! The version gate
//!
//! A [`VersionGate`] owns the selection state for one native library and
//! serializes every attempt to change it. The check of the current state and
//! the native registration happen under the same lock, so at most one
//! registration ever reaches the native library and concurrent callers see
//! its outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::native::{NativeClient, NativeErrorCode};
use crate::version::{ApiVersion, VersionRange};

/// Selection state of a gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessVersionState {
    /// No version has been committed
    Unselected,
    /// `v` was committed; it never changes afterwards
    Selected(ApiVersion),
    /// The native entry point could not run; the library is unusable
    LinkageFailed(String),
}

/// One-shot API version negotiation against a native library
#[derive(Debug)]
pub struct VersionGate {
    native: Arc<dyn NativeClient>,
    supported: VersionRange,
    state: Mutex<ProcessVersionState>,
}

impl VersionGate {
    /// Gate enforcing the compiled header version as upper bound
    pub fn new(native: Arc<dyn NativeClient>) -> Self {
        Self::with_range(native, VersionRange::default())
    }

    /// Gate enforcing `supported`; `supported.max` is passed to the native
    /// library as the header version
    pub fn with_range(native: Arc<dyn NativeClient>, supported: VersionRange) -> Self {
        Self {
            native,
            supported,
            state: Mutex::new(ProcessVersionState::Unselected),
        }
    }

    /// Select `requested` as the API version, exactly once.
    ///
    /// Repeating the committed version succeeds without touching the native
    /// library. Any other version fails once a selection exists.
    #[instrument(level = "debug", skip(self))]
    pub fn select_api_version(&self, requested: i32) -> Result<()> {
        let mut state = self.lock_state();

        match &*state {
            ProcessVersionState::Selected(v) if v.get() == requested => {
                debug!(requested, "API version already selected");
                return Ok(());
            }
            ProcessVersionState::Selected(v) => {
                warn!(requested, selected = v.get(), "Conflicting API version request");
                return Err(Error::AlreadySelectedDifferentVersion {
                    requested,
                    selected: Some(*v),
                });
            }
            ProcessVersionState::LinkageFailed(message) => {
                return Err(Error::linkage(message.clone(), None));
            }
            ProcessVersionState::Unselected => {}
        }

        let version = match ApiVersion::new(requested) {
            Some(v) if requested <= self.supported.max => v,
            _ => {
                warn!(requested, range = %self.supported, "API version outside header range");
                return Err(Error::out_of_range(requested, self.supported));
            }
        };

        let code = match self
            .native
            .select_api_version_impl(requested, self.supported.max)
        {
            Ok(code) => code,
            Err(e) => {
                error!(requested, error = %e, "Native API version selection could not run");
                *state = ProcessVersionState::LinkageFailed(e.detail());
                return Err(e);
            }
        };

        if code.is_success() {
            *state = ProcessVersionState::Selected(version);
            info!(requested, "API version selected");
            return Ok(());
        }

        warn!(requested, native_code = code.0, "Native library rejected API version");
        if code == NativeErrorCode::API_VERSION_ALREADY_SET {
            return Err(Error::AlreadySelectedDifferentVersion {
                requested,
                selected: None,
            });
        }
        Err(Error::unsupported(
            requested,
            code,
            self.native.describe_error(code),
        ))
    }

    /// The committed version, if any
    pub fn selected_version(&self) -> Option<ApiVersion> {
        match &*self.lock_state() {
            ProcessVersionState::Selected(v) => Some(*v),
            _ => None,
        }
    }

    /// Fail with `VersionNotSelected` until a version has been committed
    pub fn ensure_selected(&self) -> Result<ApiVersion> {
        match &*self.lock_state() {
            ProcessVersionState::Selected(v) => Ok(*v),
            ProcessVersionState::LinkageFailed(message) => Err(Error::linkage(message.clone(), None)),
            ProcessVersionState::Unselected => Err(Error::VersionNotSelected),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ProcessVersionState {
        self.lock_state().clone()
    }

    /// Range checked before the native library is called
    pub fn supported_range(&self) -> VersionRange {
        self.supported
    }

    /// Highest version the loaded native library reports
    pub fn max_supported_version(&self) -> Result<ApiVersion> {
        let raw = self.native.max_api_version()?;
        ApiVersion::new(raw).ok_or_else(|| {
            Error::linkage(
                format!("Native library reported invalid max API version {}", raw),
                None,
            )
        })
    }

    // The state is only ever replaced wholesale, so a guard recovered from a
    // poisoned lock is still consistent.
    fn lock_state(&self) -> MutexGuard<'_, ProcessVersionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::native::SimulatedClient;
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::thread;

    fn setup() -> (Arc<SimulatedClient>, VersionGate) {
        let native = Arc::new(SimulatedClient::new(VersionRange::new(13, 730).unwrap()));
        let gate = VersionGate::with_range(native.clone(), VersionRange::new(13, 730).unwrap());
        (native, gate)
    }

    #[test]
    fn test_select_then_repeat() {
        let (native, gate) = setup();

        gate.select_api_version(600).unwrap();
        gate.select_api_version(600).unwrap();

        assert_eq!(gate.selected_version().map(ApiVersion::get), Some(600));
        assert_eq!(native.registration_calls(), 1);
    }

    #[test]
    fn test_different_version_rejected() {
        let (native, gate) = setup();
        gate.select_api_version(600).unwrap();

        let err = gate.select_api_version(610).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadySelectedDifferentVersion);
        assert_eq!(gate.selected_version().map(ApiVersion::get), Some(600));
        assert_eq!(native.registration_calls(), 1);
    }

    #[test]
    fn test_too_old_version_leaves_gate_unselected() {
        let (native, gate) = setup();

        let err = gate.select_api_version(5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.native_code(), Some(NativeErrorCode::API_VERSION_NOT_SUPPORTED));
        assert_eq!(gate.state(), ProcessVersionState::Unselected);
        assert_eq!(native.registration_calls(), 1);

        // a later valid request still wins
        gate.select_api_version(600).unwrap();
    }

    #[test]
    fn test_above_header_version_never_reaches_native() {
        let (native, gate) = setup();

        for requested in [731, 0, -1] {
            let err = gate.select_api_version(requested).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
            assert_eq!(err.native_code(), Some(NativeErrorCode::API_VERSION_INVALID));
        }
        assert_eq!(native.registration_calls(), 0);
        assert_eq!(gate.state(), ProcessVersionState::Unselected);
    }

    #[test]
    fn test_library_older_than_header() {
        let native = Arc::new(SimulatedClient::new(VersionRange::new(13, 600).unwrap()));
        let gate = VersionGate::new(native.clone());

        let err = gate.select_api_version(500).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.native_code(), Some(NativeErrorCode::API_VERSION_NOT_SUPPORTED));
        assert_eq!(gate.state(), ProcessVersionState::Unselected);
        assert_eq!(native.registration_calls(), 1);
    }

    #[test]
    fn test_selection_outside_gate() {
        let (native, gate) = setup();
        native.preselect(520);

        let err = gate.select_api_version(600).unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadySelectedDifferentVersion { requested: 600, selected: None }
        ));
        assert_eq!(gate.state(), ProcessVersionState::Unselected);
    }

    #[test]
    fn test_linkage_failure_is_sticky() {
        let native = Arc::new(SimulatedClient::unlinked("library not loaded"));
        let gate = VersionGate::new(native.clone());

        let err = gate.select_api_version(600).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeLinkageError);
        assert!(matches!(gate.state(), ProcessVersionState::LinkageFailed(_)));

        let err = gate.select_api_version(600).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("library not loaded"));
        assert_eq!(native.registration_calls(), 1);

        assert_eq!(gate.ensure_selected().unwrap_err().kind(), ErrorKind::NativeLinkageError);
    }

    #[test]
    fn test_ensure_selected() {
        let (_native, gate) = setup();
        assert!(matches!(gate.ensure_selected(), Err(Error::VersionNotSelected)));

        gate.select_api_version(700).unwrap();
        assert_eq!(gate.ensure_selected().unwrap().get(), 700);
    }

    #[test]
    fn test_max_supported_version() {
        let native = Arc::new(SimulatedClient::new(VersionRange::new(13, 710).unwrap()));
        let gate = VersionGate::new(native);
        assert_eq!(gate.max_supported_version().unwrap().get(), 710);
    }

    #[test]
    fn test_concurrent_same_version() {
        let (native, gate) = setup();
        let gate = Arc::new(gate);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    gate.select_api_version(600)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(native.registration_calls(), 1);
    }

    #[test]
    fn test_concurrent_different_versions() {
        let (native, gate) = setup();
        let gate = Arc::new(gate);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = gate.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    gate.select_api_version(600 + i)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::AlreadySelectedDifferentVersion);
        }
        assert_eq!(native.registration_calls(), 1);
    }

    proptest! {
        #[test]
        fn prop_valid_version_is_idempotent(v in 13i32..=730) {
            let (native, gate) = setup();
            prop_assert!(gate.select_api_version(v).is_ok());
            prop_assert!(gate.select_api_version(v).is_ok());
            prop_assert_eq!(native.registration_calls(), 1);
        }

        #[test]
        fn prop_second_version_conflicts(v1 in 13i32..=730, v2 in 13i32..=730) {
            prop_assume!(v1 != v2);
            let (_native, gate) = setup();
            gate.select_api_version(v1).unwrap();
            let err = gate.select_api_version(v2).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::AlreadySelectedDifferentVersion);
        }

        #[test]
        fn prop_out_of_range_stays_unselected(v in prop_oneof![i32::MIN..13i32, 731i32..i32::MAX]) {
            let (_native, gate) = setup();
            let err = gate.select_api_version(v).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
            prop_assert_eq!(gate.state(), ProcessVersionState::Unselected);
        }
    }
}
