//! Memory allocation utilities for FFI functions.
//!
//! Everything handed to the host is allocated with `malloc` so the host can
//! release it through the `ntl_free_*` functions.

use core::ffi::c_char;
use libc::{free, malloc};
use ntl_fcst_core::{ForecastError, Result};
use std::ptr;

/// Copy a Rust slice to a newly allocated C array.
///
/// # Safety
/// Returns null on allocation failure or if slice is empty.
pub unsafe fn slice_to_c_array<T: Copy>(slice: &[T]) -> *mut T {
    if slice.is_empty() {
        return ptr::null_mut();
    }

    let ptr = malloc(std::mem::size_of_val(slice)) as *mut T;
    if !ptr.is_null() {
        ptr::copy_nonoverlapping(slice.as_ptr(), ptr, slice.len());
    }
    ptr
}

/// Copy a non-empty slice to a newly allocated C array.
///
/// # Errors
/// [`ForecastError::AllocationError`] when `malloc` fails.
///
/// # Safety
/// The returned pointer must be released with [`free_ptr`].
pub unsafe fn alloc_copy<T: Copy>(items: &[T]) -> Result<*mut T> {
    let ptr = slice_to_c_array(items);
    if ptr.is_null() && !items.is_empty() {
        return Err(ForecastError::AllocationError(
            "Memory allocation failed".to_string(),
        ));
    }
    Ok(ptr)
}

/// Copy a string into a newly allocated null-terminated C string.
///
/// # Safety
/// Returns null on allocation failure.
pub unsafe fn alloc_c_string(s: &str) -> *mut c_char {
    let ptr = malloc(s.len() + 1) as *mut c_char;
    if !ptr.is_null() {
        ptr::copy_nonoverlapping(s.as_ptr() as *const c_char, ptr, s.len());
        *ptr.add(s.len()) = 0; // Null terminator
    }
    ptr
}

/// Allocate and copy a string array.
///
/// # Safety
/// out_array must be a valid pointer.
/// Returns true on success, false on allocation failure.
pub unsafe fn alloc_string_array(strings: &[String], out_array: *mut *mut *mut c_char) -> bool {
    let n = strings.len();
    if n == 0 {
        *out_array = ptr::null_mut();
        return true;
    }

    let array_ptr = malloc(n * std::mem::size_of::<*mut c_char>()) as *mut *mut c_char;
    if array_ptr.is_null() {
        return false;
    }

    for (i, s) in strings.iter().enumerate() {
        let str_ptr = alloc_c_string(s);
        if str_ptr.is_null() {
            // Clean up already allocated strings
            for j in 0..i {
                free(*array_ptr.add(j) as *mut core::ffi::c_void);
            }
            free(array_ptr as *mut core::ffi::c_void);
            return false;
        }
        *array_ptr.add(i) = str_ptr;
    }

    *out_array = array_ptr;
    true
}

/// Free a C pointer allocated by this module.
///
/// # Safety
/// ptr must be either null or a valid pointer allocated by malloc.
#[inline]
pub unsafe fn free_ptr(ptr: *mut core::ffi::c_void) {
    if !ptr.is_null() {
        free(ptr);
    }
}

/// Macro to free multiple struct fields.
///
/// Usage:
/// ```ignore
/// free_fields!(result, field1, field2, field3);
/// ```
#[macro_export]
macro_rules! free_fields {
    ($result:expr, $($field:ident),+ $(,)?) => {{
        $(
            if !$result.$field.is_null() {
                $crate::allocation::free_ptr($result.$field as *mut core::ffi::c_void);
                $result.$field = std::ptr::null_mut();
            }
        )+
    }};
}
