//! FFI bindings for Posture Flux
//!
//! This module provides C-compatible functions for calling Flux from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `posture_free_string`.
//!
//! Frames cross the boundary as JSON documents (`null` for "no person
//! detected"); results come back as report JSON.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::encoder::ReportEncoder;
use crate::pipeline::{frame_to_report, FrameProcessor};

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

// ============================================================================
// Stateless API
// ============================================================================

/// Assess one frame JSON document and return a report JSON document.
///
/// # Safety
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_frame_to_report(frame_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame JSON string pointer");
            return ptr::null_mut();
        }
    };

    match frame_to_report(json_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a FrameProcessor
pub struct PostureProcessorHandle {
    processor: FrameProcessor,
    encoder: ReportEncoder,
}

impl PostureProcessorHandle {
    fn new(config: &EngineConfig) -> Self {
        Self {
            processor: FrameProcessor::new(config),
            encoder: ReportEncoder::new(),
        }
    }
}

/// Create a new processor keeping up to `history_capacity` score records.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `posture_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_new(history_capacity: i32) -> *mut PostureProcessorHandle {
    clear_last_error();

    let mut config = EngineConfig::default();
    if history_capacity > 0 {
        config.history_capacity = history_capacity as usize;
    }

    Box::into_raw(Box::new(PostureProcessorHandle::new(&config)))
}

/// Create a new processor from an engine configuration JSON document.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Must be freed with `posture_processor_free`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_new_with_config(
    config_json: *const c_char,
) -> *mut PostureProcessorHandle {
    clear_last_error();

    let json_str = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config JSON string pointer");
            return ptr::null_mut();
        }
    };

    match EngineConfig::from_json(&json_str) {
        Ok(config) => Box::into_raw(Box::new(PostureProcessorHandle::new(&config))),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `posture_processor_new*`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_free(processor: *mut PostureProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Process one frame JSON document and return a report including history.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `posture_processor_new*`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_process(
    processor: *mut PostureProcessorHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame JSON string pointer");
            return ptr::null_mut();
        }
    };

    let outcome = match handle.processor.process_json(&json_str) {
        Ok(outcome) => outcome,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match handle
        .encoder
        .encode_to_json(&outcome, handle.processor.history())
    {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return the current history as a JSON array of score records, oldest first.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `posture_processor_new*`.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_history(
    processor: *mut PostureProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match serde_json::to_string(&handle.processor.history_snapshot()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Clear the processor's history.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `posture_processor_new*`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_reset(processor: *mut PostureProcessorHandle) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    (*processor).processor.reset();
    0
}

/// Save processor history to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `posture_processor_new*`.
/// - Returns a newly allocated string that must be freed with `posture_free_string`.
/// - Returns NULL on error; call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_save_history(
    processor: *mut PostureProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_history() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load processor history from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `posture_processor_new*`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `posture_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn posture_processor_load_history(
    processor: *mut PostureProcessorHandle,
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

    match handle.processor.load_history(&json_str) {
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

/// Free a string returned by Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posture_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Flux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn posture_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn posture_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
