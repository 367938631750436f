//! FFI bindings for Kardia
//!
//! This module provides C-compatible functions for calling Kardia from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `kardia_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::pipeline::{evaluate_json, KardiaProcessor};
use crate::store::{StoreConfig, DEFAULT_RECENT_LIMIT};

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

/// Serialize a value, recording failures as the last error
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
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

/// Evaluate one reading (`{"heartRate", "spo2", "temperature", "motionLevel"}`)
/// and return the evaluation JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `kardia_free_string`.
/// - Returns NULL on error; call `kardia_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kardia_evaluate(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match evaluate_json(&json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a KardiaProcessor
pub struct KardiaProcessorHandle {
    processor: KardiaProcessor,
}

/// Create a new KardiaProcessor.
///
/// `recent_limit <= 0` selects the default limit; `max_records <= 0` keeps
/// every record.
///
/// # Safety
/// - Returns a pointer to a newly allocated KardiaProcessor.
/// - Must be freed with `kardia_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_new(
    recent_limit: i32,
    max_records: i32,
) -> *mut KardiaProcessorHandle {
    clear_last_error();

    let config = StoreConfig {
        recent_limit: if recent_limit <= 0 {
            DEFAULT_RECENT_LIMIT
        } else {
            recent_limit as usize
        },
        max_records: if max_records <= 0 {
            None
        } else {
            Some(max_records as usize)
        },
    };

    let processor = KardiaProcessor::with_config(config);
    let handle = Box::new(KardiaProcessorHandle { processor });
    Box::into_raw(handle)
}

/// Free a KardiaProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kardia_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_free(processor: *mut KardiaProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Ingest one measurement payload and return the outcome JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kardia_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `kardia_free_string`.
/// - Returns NULL on error; call `kardia_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_ingest(
    processor: *mut KardiaProcessorHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match handle.processor.ingest_json(&json_str) {
        Ok(outcome) => json_to_cstr(&outcome),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Latest reading with a fresh evaluation.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kardia_processor_new`.
/// - Returns a newly allocated string that must be freed with `kardia_free_string`.
/// - Returns NULL when the store is empty (no error is set) or on error.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_latest(
    processor: *mut KardiaProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.latest_evaluation() {
        Some(latest) => json_to_cstr(&latest),
        None => ptr::null_mut(),
    }
}

/// Today's insight for a user, relative to the current UTC time.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kardia_processor_new`.
/// - Returns a newly allocated string that must be freed with `kardia_free_string`.
/// - Returns NULL when there is no data today (no error is set) or on error.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_today_insight(
    processor: *mut KardiaProcessorHandle,
    user_id: u64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.today_insight(user_id, Utc::now()) {
        Some(insight) => json_to_cstr(&insight),
        None => ptr::null_mut(),
    }
}

/// Save the processor's store to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kardia_processor_new`.
/// - Returns a newly allocated string that must be freed with `kardia_free_string`.
/// - Returns NULL on error; call `kardia_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_save(
    processor: *mut KardiaProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_store() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load the processor's store from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kardia_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn kardia_processor_load(
    processor: *mut KardiaProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_store(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Kardia functions.
///
/// # Safety
/// - `s` must be a pointer returned by a Kardia function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn kardia_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local string that is valid until the next
///   Kardia call on the same thread.
/// - Returns NULL if there is no error.
/// - Do NOT free the returned pointer.
#[no_mangle]
pub unsafe extern "C" fn kardia_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Kardia library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn kardia_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
