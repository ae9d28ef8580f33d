//! C ABI bindings for the xmltree path-addressed XML editor.
//!
//! Exposes an opaque handle plus errno-style `c_int` status codes, matching
//! the language-neutral contract rather than generating bindings for a
//! specific foreign runtime: callers are arbitrary C hosts, not a single
//! mobile platform.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CStr, CString};
use std::slice;

use xmltree_core::{Errno, XmlDocument, XmlTreeError};

pub const XMLTREE_OK: c_int = 0;
pub const XMLTREE_ENOENT: c_int = -1;
pub const XMLTREE_EINVAL: c_int = -2;
pub const XMLTREE_ENOMEM: c_int = -3;
pub const XMLTREE_EEXIST: c_int = -4;
pub const XMLTREE_EPERM: c_int = -5;
pub const XMLTREE_EIO: c_int = -6;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = CString::new(message).ok();
    });
}

fn status_of(err: &XmlTreeError) -> c_int {
    match err.errno() {
        Errno::NoEnt => XMLTREE_ENOENT,
        Errno::Inval => XMLTREE_EINVAL,
        Errno::NoMem => XMLTREE_ENOMEM,
        Errno::Exist => XMLTREE_EEXIST,
        Errno::Perm => XMLTREE_EPERM,
        Errno::Io => XMLTREE_EIO,
    }
}

fn fail(err: XmlTreeError) -> c_int {
    let status = status_of(&err);
    set_last_error(err.to_string());
    status
}

/// Returns the message of the last error recorded on this thread, or a null
/// pointer if none is set. Caller-owned; release with `xmltree_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn xmltree_last_error() -> *mut c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(msg) => msg.clone().into_raw(),
        None => std::ptr::null_mut(),
    })
}

/// Opaque handle over a borrowed byte buffer plus its edit journal. The
/// caller must keep `bytes` alive and unchanged for the handle's lifetime.
pub struct XmlTreeHandle {
    source: Box<[u8]>,
    doc: XmlDocument<'static>,
}

/// Borrows `bytes[..len]`, copying it into owned storage so the handle does
/// not outlive a caller-managed buffer. Never returns null: construction in
/// this crate cannot fail (no parsing happens up front).
///
/// # Safety
/// `bytes` must point to at least `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_new(bytes: *const u8, len: usize) -> *mut XmlTreeHandle {
    if bytes.is_null() {
        return std::ptr::null_mut();
    }
    let slice = unsafe { slice::from_raw_parts(bytes, len) };
    let source: Box<[u8]> = slice.to_vec().into_boxed_slice();
    // SAFETY: `doc` borrows `source`, which is boxed alongside it inside
    // the same heap allocation's lifetime; the borrow never escapes the
    // handle, and the handle is only ever read through its own methods.
    let static_source: &'static [u8] = unsafe { std::mem::transmute(&*source) };
    let handle = Box::new(XmlTreeHandle { source, doc: XmlDocument::new(static_source) });
    Box::into_raw(handle)
}

/// Releases the handle and its journal.
///
/// # Safety
/// `h` must be a pointer previously returned by `xmltree_new`, not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_free(h: *mut XmlTreeHandle) {
    if !h.is_null() {
        drop(unsafe { Box::from_raw(h) });
    }
}

/// # Safety
/// `h` and `key` must be valid for the duration of the call.
unsafe fn with_key<'a>(key: *const c_char) -> Result<&'a str, c_int> {
    if key.is_null() {
        set_last_error("null key".into());
        return Err(XMLTREE_EINVAL);
    }
    unsafe { CStr::from_ptr(key) }.to_str().map_err(|_| {
        set_last_error("key is not valid UTF-8".into());
        XMLTREE_EINVAL
    })
}

fn to_owned_c_string(value: String) -> *mut c_char {
    CString::new(value).map(CString::into_raw).unwrap_or(std::ptr::null_mut())
}

/// # Safety
/// `h` must be a live handle from `xmltree_new`; `key` a NUL-terminated
/// string; `out` a writable pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_get(h: *mut XmlTreeHandle, key: *const c_char, out: *mut *mut c_char) -> c_int {
    let handle = unsafe { &*h };
    let key = match unsafe { with_key(key) } {
        Ok(k) => k,
        Err(status) => return status,
    };
    match handle.doc.get(key) {
        Ok(value) => {
            unsafe { *out = to_owned_c_string(value) };
            XMLTREE_OK
        }
        Err(e) => fail(e),
    }
}

/// # Safety
/// `h` must be a live handle; `key` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_exists(h: *mut XmlTreeHandle, key: *const c_char) -> bool {
    let handle = unsafe { &*h };
    match unsafe { with_key(key) } {
        Ok(k) => handle.doc.exists(k),
        Err(_) => false,
    }
}

/// # Safety
/// `h` must be a live handle; `key`/`value` NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_update(h: *mut XmlTreeHandle, key: *const c_char, value: *const c_char) -> c_int {
    let handle = unsafe { &mut *h };
    let key = match unsafe { with_key(key) } {
        Ok(k) => k,
        Err(status) => return status,
    };
    let value = match unsafe { with_key(value) } {
        Ok(v) => v,
        Err(status) => return status,
    };
    match handle.doc.update(key, value) {
        Ok(()) => XMLTREE_OK,
        Err(e) => fail(e),
    }
}

/// `value` may be null for a pure-container append.
///
/// # Safety
/// `h` must be a live handle; `key` a NUL-terminated string; `value` either
/// null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_append(h: *mut XmlTreeHandle, key: *const c_char, value: *const c_char) -> c_int {
    let handle = unsafe { &mut *h };
    let key = match unsafe { with_key(key) } {
        Ok(k) => k,
        Err(status) => return status,
    };
    let value = if value.is_null() {
        None
    } else {
        match unsafe { with_key(value) } {
            Ok(v) => Some(v),
            Err(status) => return status,
        }
    };
    match handle.doc.append(key, value) {
        Ok(()) => XMLTREE_OK,
        Err(e) => fail(e),
    }
}

/// # Safety
/// `h` must be a live handle; `key` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_delete(h: *mut XmlTreeHandle, key: *const c_char) -> c_int {
    let handle = unsafe { &mut *h };
    let key = match unsafe { with_key(key) } {
        Ok(k) => k,
        Err(status) => return status,
    };
    match handle.doc.delete(key) {
        Ok(()) => XMLTREE_OK,
        Err(e) => fail(e),
    }
}

/// `value` may be null, meaning delete.
///
/// # Safety
/// Same as `xmltree_append`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_set(h: *mut XmlTreeHandle, key: *const c_char, value: *const c_char) -> c_int {
    let handle = unsafe { &mut *h };
    let key = match unsafe { with_key(key) } {
        Ok(k) => k,
        Err(status) => return status,
    };
    let value = if value.is_null() {
        None
    } else {
        match unsafe { with_key(value) } {
            Ok(v) => Some(v),
            Err(status) => return status,
        }
    };
    match handle.doc.set(key, value) {
        Ok(()) => XMLTREE_OK,
        Err(e) => fail(e),
    }
}

/// # Safety
/// `h` must be a live handle; `key` a NUL-terminated string; `out` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_expand_key(
    h: *mut XmlTreeHandle,
    key: *const c_char,
    out: *mut *mut c_char,
) -> c_int {
    let handle = unsafe { &*h };
    let key = match unsafe { with_key(key) } {
        Ok(k) => k,
        Err(status) => return status,
    };
    match handle.doc.expand_key(key) {
        Ok(expanded) => {
            unsafe { *out = to_owned_c_string(expanded) };
            XMLTREE_OK
        }
        Err(e) => fail(e),
    }
}

/// Serializes the document into a freshly-allocated buffer.
///
/// # Safety
/// `h` must be a live handle; `out_bytes`/`out_len` writable pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_write(
    h: *mut XmlTreeHandle,
    out_bytes: *mut *mut u8,
    out_len: *mut usize,
) -> c_int {
    let handle = unsafe { &*h };
    let mut buf = handle.doc.to_vec();
    buf.shrink_to_fit();
    let len = buf.len();
    let ptr = buf.as_mut_ptr();
    std::mem::forget(buf);
    unsafe {
        *out_bytes = ptr;
        *out_len = len;
    }
    XMLTREE_OK
}

/// Releases a buffer previously returned by `xmltree_write`.
///
/// # Safety
/// `ptr`/`len` must be exactly the pair returned by `xmltree_write`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_free_bytes(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        drop(unsafe { Vec::from_raw_parts(ptr, len, len) });
    }
}

/// Lists every key in the document. On success, `*out_ptr` points to an
/// array of `*out_count` owned C strings.
///
/// # Safety
/// `h` must be a live handle; `out_ptr`/`out_count` writable pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_keys(
    h: *mut XmlTreeHandle,
    out_ptr: *mut *mut *mut c_char,
    out_count: *mut usize,
) -> c_int {
    let handle = unsafe { &*h };
    let keys = handle.doc.keys();
    let mut owned: Vec<*mut c_char> = keys.into_iter().map(to_owned_c_string).collect();
    owned.shrink_to_fit();
    let len = owned.len();
    let ptr = owned.as_mut_ptr();
    std::mem::forget(owned);
    unsafe {
        *out_ptr = ptr;
        *out_count = len;
    }
    XMLTREE_OK
}

/// Releases a single string returned by `xmltree_get`/`xmltree_expand_key`/
/// `xmltree_last_error`.
///
/// # Safety
/// `s` must be a pointer previously returned by one of those functions, or
/// null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Releases the array returned by `xmltree_keys`, plus every string in it.
///
/// # Safety
/// `ptr`/`count` must be exactly the pair returned by `xmltree_keys`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmltree_free_keys(ptr: *mut *mut c_char, count: usize) {
    if ptr.is_null() {
        return;
    }
    let strings = unsafe { Vec::from_raw_parts(ptr, count, count) };
    for s in strings {
        unsafe { xmltree_free_string(s) };
    }
}
