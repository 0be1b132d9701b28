//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible fields: `*mut c_char`
//! instead of `String`, pointer + length instead of `Vec`, and enums with
//! explicit discriminants. Conversions live here so `lib.rs` stays focused
//! on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use cities_core::{AsyncFetchController, DisplayMode, DisplayResult, FetchListener};

/// Called with each delivered result. `result` is only valid for the
/// duration of the call.
pub type FfiResultCallback =
    extern "C" fn(user_data: *mut c_void, generation: u64, result: *const FfiDisplayResult);

/// Called when the controller is reset.
pub type FfiResetCallback = extern "C" fn(user_data: *mut c_void);

/// Opaque controller handle.
pub struct FfiController {
    pub(crate) inner: AsyncFetchController<CallbackListener>,
}

pub(crate) struct CallbackListener {
    pub(crate) on_result: FfiResultCallback,
    pub(crate) on_reset: Option<FfiResetCallback>,
    pub(crate) user_data: *mut c_void,
}

impl FetchListener for CallbackListener {
    fn on_result(&mut self, generation: u64, result: DisplayResult) {
        let ffi_result = FfiDisplayResult::from_core(result);
        (self.on_result)(self.user_data, generation, ffi_result);
        free_display_result(ffi_result);
    }

    fn on_reset(&mut self) {
        if let Some(on_reset) = self.on_reset {
            on_reset(self.user_data);
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDisplayMode {
    List = 0,
    Text = 1,
}

impl From<FfiDisplayMode> for DisplayMode {
    fn from(mode: FfiDisplayMode) -> Self {
        match mode {
            FfiDisplayMode::List => DisplayMode::List,
            FfiDisplayMode::Text => DisplayMode::Text,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResultKind {
    Cities = 0,
    Text = 1,
}

/// A display result exposed to C.
///
/// `Cities`: `items` holds `items_len` city names and `text` is null.
/// `Text`: `text` is set and `items` is null. `no_data` marks the
/// empty-state result of either kind.
#[repr(C)]
pub struct FfiDisplayResult {
    pub kind: FfiResultKind,
    pub no_data: bool,
    pub items: *mut *mut c_char,
    pub items_len: u32,
    pub text: *mut c_char,
}

impl FfiDisplayResult {
    pub(crate) fn from_core(result: DisplayResult) -> *mut Self {
        let no_data = result.is_no_data();
        let ffi = match result {
            DisplayResult::Cities(cities) => {
                let items_len = cities.len() as u32;
                let items = if cities.is_empty() {
                    std::ptr::null_mut()
                } else {
                    let ptrs: Box<[*mut c_char]> = cities.into_iter().map(to_c_string).collect();
                    Box::into_raw(ptrs) as *mut *mut c_char
                };
                FfiDisplayResult {
                    kind: FfiResultKind::Cities,
                    no_data,
                    items,
                    items_len,
                    text: std::ptr::null_mut(),
                }
            }
            DisplayResult::Text(text) => FfiDisplayResult {
                kind: FfiResultKind::Text,
                no_data,
                items: std::ptr::null_mut(),
                items_len: 0,
                text: to_c_string(text),
            },
        };
        Box::into_raw(Box::new(ffi))
    }
}

/// Release an `FfiDisplayResult` built by `from_core`. Null is a no-op.
pub(crate) fn free_display_result(result: *mut FfiDisplayResult) {
    if result.is_null() {
        return;
    }
    let result = unsafe { Box::from_raw(result) };
    if !result.items.is_null() && result.items_len > 0 {
        let slice = std::ptr::slice_from_raw_parts_mut(result.items, result.items_len as usize);
        let items = unsafe { Box::from_raw(slice) };
        for item in items.iter() {
            free_c_string(*item);
        }
    }
    free_c_string(result.text);
}

// ---------------------------------------------------------------------------
// Host-does-IO request/response types
// ---------------------------------------------------------------------------

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// A SOAP POST described as C-compatible plain data.
#[repr(C)]
pub struct FfiHttpRequest {
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: cities_core::HttpRequest) -> *mut Self {
        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            Box::into_raw(headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            url: to_c_string(req.url),
            headers,
            headers_len,
            body: to_c_string(req.body),
        }))
    }
}

/// An HTTP response provided by the C caller. The FFI layer reads but does
/// not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

/// Interior NULs cannot be represented and are dropped.
pub(crate) fn to_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}
