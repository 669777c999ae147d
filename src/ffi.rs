//! FFI bindings for Stress Sense
//!
//! This module provides C-compatible functions for calling Stress Sense from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `stress_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::baseline::FileBaselineStore;
use crate::encoder::ReportEncoder;
use crate::pipeline::{analyze_session_json, calibrate_session_json, StressProcessor};
use crate::types::FeatureVector;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Map a `Result<String, E>` onto the C convention: string or NULL + last error
fn into_c_result<E: std::fmt::Display>(result: Result<String, E>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a session submission and return the report JSON.
///
/// # Safety
/// - `session_json` must be a valid null-terminated C string.
/// - `baseline_json` may be NULL (no baseline) or a valid C string holding a
///   flat feature object. An unparsable baseline is treated as absent.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_analyze_json(
    session_json: *const c_char,
    baseline_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let session_str = match cstr_to_string(session_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session JSON string pointer");
            return ptr::null_mut();
        }
    };

    let baseline: Option<FeatureVector> =
        cstr_to_string(baseline_json).and_then(|json| serde_json::from_str(&json).ok());

    into_c_result(
        analyze_session_json(&session_str, baseline.as_ref())
            .and_then(|report| ReportEncoder::new().encode(&report)),
    )
}

/// Compute the baseline for a calibration session and return it as JSON.
/// Nothing is persisted; the caller stores the returned object.
///
/// # Safety
/// - `session_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_calibrate_json(session_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let session_str = match cstr_to_string(session_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session JSON string pointer");
            return ptr::null_mut();
        }
    };

    into_c_result(calibrate_session_json(&session_str).and_then(|calibration| {
        serde_json::to_string(&calibration.baseline).map_err(Into::into)
    }))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a processor backed by a baseline file
pub struct StressProcessorHandle {
    processor: StressProcessor<FileBaselineStore>,
    encoder: ReportEncoder,
}

/// Create a processor whose baseline lives at `baseline_path`.
///
/// # Safety
/// - `baseline_path` must be a valid null-terminated C string.
/// - Must be freed with `stress_processor_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_new(
    baseline_path: *const c_char,
) -> *mut StressProcessorHandle {
    clear_last_error();

    let path = match cstr_to_string(baseline_path) {
        Some(s) => s,
        None => {
            set_last_error("Invalid baseline path pointer");
            return ptr::null_mut();
        }
    };

    let handle = Box::new(StressProcessorHandle {
        processor: StressProcessor::new(FileBaselineStore::new(path)),
        encoder: ReportEncoder::new(),
    });
    Box::into_raw(handle)
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_free(processor: *mut StressProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Calibrate from a session and overwrite the stored baseline.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - `session_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_calibrate(
    processor: *mut StressProcessorHandle,
    session_json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &*processor;

    let session_str = match cstr_to_string(session_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session JSON string pointer");
            return -1;
        }
    };

    match handle.processor.calibrate_json(&session_str) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Analyze a session against the stored baseline and return the report JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - `session_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_analyze(
    processor: *mut StressProcessorHandle,
    session_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let session_str = match cstr_to_string(session_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session JSON string pointer");
            return ptr::null_mut();
        }
    };

    into_c_result(
        handle
            .processor
            .submit(&session_str)
            .and_then(|report| handle.encoder.encode(&report)),
    )
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stress Sense functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stress Sense function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stress_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stress Sense call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stress_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stress_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_session_json() -> CString {
        CString::new(
            r#"{
            "movements": [
                {"x": 0, "y": 0, "timestamp": 1000.0},
                {"x": 10, "y": 0, "timestamp": 1001.0},
                {"x": 30, "y": 5, "timestamp": 1001.5}
            ],
            "keystrokes": [
                {"key": "a", "action": "down", "timestamp": 1002.0},
                {"key": "a", "action": "up", "timestamp": 1002.1},
                {"key": "b", "action": "down", "timestamp": 1002.4},
                {"key": "b", "action": "up", "timestamp": 1002.5}
            ]
        }"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        stress_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_analyze_without_baseline() {
        let json = sample_session_json();
        unsafe {
            let report = take_string(stress_analyze_json(json.as_ptr(), ptr::null()));
            let payload: serde_json::Value = serde_json::from_str(&report).unwrap();
            assert_eq!(payload["scoring_path"], "heuristic");
            assert_eq!(payload["data_points"], 7);
            assert_eq!(payload["producer"]["name"], crate::PRODUCER_NAME);
        }
    }

    #[test]
    fn test_ffi_calibrate_then_analyze() {
        let json = sample_session_json();
        unsafe {
            let baseline = take_string(stress_calibrate_json(json.as_ptr()));
            let baseline_c = CString::new(baseline).unwrap();

            let report = take_string(stress_analyze_json(json.as_ptr(), baseline_c.as_ptr()));
            let payload: serde_json::Value = serde_json::from_str(&report).unwrap();
            assert_eq!(payload["scoring_path"], "baseline");
            assert_eq!(payload["stress_score"], 0.5);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        let dir = tempdir().unwrap();
        let path = CString::new(dir.path().join("baseline.json").to_str().unwrap()).unwrap();
        let json = sample_session_json();

        unsafe {
            let processor = stress_processor_new(path.as_ptr());
            assert!(!processor.is_null());

            assert_eq!(stress_processor_calibrate(processor, json.as_ptr()), 0);

            let report = take_string(stress_processor_analyze(processor, json.as_ptr()));
            let payload: serde_json::Value = serde_json::from_str(&report).unwrap();
            assert_eq!(payload["scoring_path"], "baseline");

            stress_processor_free(processor);
        }
        assert!(dir.path().join("baseline.json").exists());
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = stress_analyze_json(invalid_json.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = stress_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("parse"));

            let empty = CString::new(r#"{"movements": []}"#).unwrap();
            assert!(stress_calibrate_json(empty.as_ptr()).is_null());
            assert!(!stress_last_error().is_null());

            assert_eq!(stress_processor_calibrate(ptr::null_mut(), empty.as_ptr()), -1);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = stress_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::STRESS_VERSION);
        }
    }
}
