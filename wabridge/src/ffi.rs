#![allow(unsafe_code)]
//! Internal FFI utilities: C string helpers.

use std::ffi::{CStr, CString, c_char};

use crate::error::{Error, Result};

/// Take ownership of a C string, convert to `String`, then free via `wa_free_string`.
pub(crate) unsafe fn take_c_string(ptr: *mut c_char) -> Result<String> {
    let s = unsafe { borrowed_string(ptr) };
    if !ptr.is_null() {
        unsafe { wabridge_ffi::wa_free_string(ptr) };
    }
    s
}

/// Copy a **borrowed** C string. Does NOT free anything.
pub(crate) unsafe fn borrowed_string(ptr: *const c_char) -> Result<String> {
    if ptr.is_null() {
        return Err(Error::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(String::from)
        .map_err(|_| Error::InvalidUtf8)
}

/// Copy a borrowed nullable C string. Null maps to `None`.
pub(crate) unsafe fn borrowed_nullable(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        Ok(None)
    } else {
        unsafe { borrowed_string(ptr) }.map(Some)
    }
}

/// Copy a borrowed array of C strings.
pub(crate) unsafe fn borrowed_strings(ptr: *const *mut c_char, count: usize) -> Result<Vec<String>> {
    if ptr.is_null() || count == 0 {
        return Ok(vec![]);
    }
    (0..count)
        .map(|i| unsafe { borrowed_string(*ptr.add(i)) })
        .collect()
}

/// Convert `&str` to `CString` for FFI.
pub(crate) fn to_c_string(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::InvalidArgument("string contains NUL".into()))
}

/// Convert optional `&str` to optional `CString`.
pub(crate) fn optional_c_string(s: Option<&str>) -> Result<Option<CString>> {
    s.map(to_c_string).transpose()
}

/// Get pointer from an optional `CString` (null if `None`).
pub(crate) fn c_str_ptr(opt: Option<&CString>) -> *const c_char {
    opt.map_or(std::ptr::null(), |c| c.as_ptr())
}
