//! Racing selections through the C ABI
//!
//! Threads released together with different versions must produce exactly
//! one winner; everyone else sees the winner's version as a conflict.

use apigate_ffi::*;
use std::ffi::CString;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_racing_different_versions() {
    let config = CString::new(r#"{"backend": "simulated"}"#).unwrap();
    assert_eq!(unsafe { apigate_configure(config.as_ptr()) }, ApigateResult::Success);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads as i32)
        .map(|i| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let version = 600 + i;
                (version, apigate_select_api_version(version))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results
        .iter()
        .filter(|(_, r)| *r == ApigateResult::Success)
        .map(|(v, _)| *v)
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(apigate_selected_api_version(), winners[0]);

    for (_, result) in results.iter().filter(|(v, _)| *v != winners[0]) {
        assert_eq!(*result, ApigateResult::AlreadySelectedDifferentVersion);
    }

    // the winner's version is still accepted from any thread
    let winner = winners[0];
    let again = thread::spawn(move || apigate_select_api_version(winner))
        .join()
        .unwrap();
    assert_eq!(again, ApigateResult::Success);
}
