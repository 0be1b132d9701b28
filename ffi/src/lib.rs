//! C-ABI wrapper around `cities-core`.
//!
//! # Overview
//! Two ways in for a host UI:
//! - A controller handle that runs fetches on a background thread and
//!   reports back through C callbacks. Callbacks fire only from
//!   `cities_controller_poll` and `cities_controller_reset`, on the calling
//!   thread, so the host can drive it from its UI loop.
//! - Host-does-IO functions that build the SOAP request and format the
//!   response, leaving the HTTP round-trip to the host's own stack.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Null arguments never crash: they yield null, zero or a no-op.
//! - The C caller owns returned pointers and must release them with the
//!   matching `cities_free_*` / `cities_controller_free` function.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use cities_core::{
    AsyncFetchController, DisplayMode, FetchSettings, HttpResponse, HttpSoapTransport,
    ResponseFormatter, SoapClient, SoapRequestBuilder, UreqExecutor, DEFAULT_ENDPOINT,
};

use types::*;

/// Borrow a C string, or `None` for null / invalid UTF-8.
fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

/// Null selects the public endpoint; a non-null string that is not UTF-8
/// is rejected rather than replaced.
fn endpoint_or_default<'a>(endpoint: *const c_char) -> Option<&'a str> {
    if endpoint.is_null() {
        return Some(DEFAULT_ENDPOINT);
    }
    let decoded = c_str(endpoint);
    if decoded.is_none() {
        tracing::warn!("Rejecting endpoint that is not valid UTF-8");
    }
    decoded
}

// ---------------------------------------------------------------------------
// Controller lifecycle
// ---------------------------------------------------------------------------

/// Create a controller posting to `endpoint` (null selects the public
/// webserviceX endpoint).
///
/// Returns null if `on_result` is null, if `endpoint` is not valid UTF-8, or
/// on an internal panic. The caller
/// must free the returned pointer with `cities_controller_free`.
#[unsafe(no_mangle)]
pub extern "C" fn cities_controller_new(
    endpoint: *const c_char,
    mode: FfiDisplayMode,
    on_result: Option<FfiResultCallback>,
    on_reset: Option<FfiResetCallback>,
    user_data: *mut c_void,
) -> *mut FfiController {
    catch_unwind(|| {
        let Some(on_result) = on_result else {
            return std::ptr::null_mut();
        };
        let Some(endpoint) = endpoint_or_default(endpoint) else {
            return std::ptr::null_mut();
        };
        let settings = FetchSettings {
            endpoint: endpoint.to_string(),
            builder: SoapRequestBuilder::default(),
            mode: mode.into(),
        };
        let listener = CallbackListener {
            on_result,
            on_reset,
            user_data,
        };
        let transport = Arc::new(HttpSoapTransport::new(UreqExecutor::new()));
        let inner = AsyncFetchController::new(transport, settings, listener);
        Box::into_raw(Box::new(FfiController { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a controller. Outstanding fetches finish in the background and
/// their results are discarded. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cities_controller_free(controller: *mut FfiController) {
    if !controller.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(controller) });
        }));
    }
}

/// Start a fetch for `query`, superseding any outstanding one. A null or
/// blank query yields the no-data result without network I/O.
///
/// Returns the fetch generation, or 0 if `controller` is null.
#[unsafe(no_mangle)]
pub extern "C" fn cities_controller_start(
    controller: *mut FfiController,
    query: *const c_char,
) -> u64 {
    catch_unwind(AssertUnwindSafe(|| {
        if controller.is_null() {
            return 0;
        }
        let controller = unsafe { &mut *controller };
        controller.inner.start(c_str(query).unwrap_or(""))
    }))
    .unwrap_or(0)
}

/// Deliver a finished result, if any, through `on_result` on the calling
/// thread. Returns true if a result was delivered.
#[unsafe(no_mangle)]
pub extern "C" fn cities_controller_poll(controller: *mut FfiController) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if controller.is_null() {
            return false;
        }
        let controller = unsafe { &mut *controller };
        controller.inner.poll()
    }))
    .unwrap_or(false)
}

/// Discard the outstanding fetch, if any, and call `on_reset`.
#[unsafe(no_mangle)]
pub extern "C" fn cities_controller_reset(controller: *mut FfiController) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if controller.is_null() {
            return;
        }
        let controller = unsafe { &mut *controller };
        controller.inner.reset();
    }));
}

/// True while a fetch is outstanding.
#[unsafe(no_mangle)]
pub extern "C" fn cities_controller_is_loading(controller: *const FfiController) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if controller.is_null() {
            return false;
        }
        let controller = unsafe { &*controller };
        matches!(
            controller.inner.state(),
            cities_core::FetchState::Loading { .. }
        )
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Host-does-IO
// ---------------------------------------------------------------------------

/// Build the SOAP 1.2 POST for `query` against `endpoint` (null selects the
/// public webserviceX endpoint).
///
/// Returns null for a null or blank query, or an endpoint that is not valid
/// UTF-8. Free with `cities_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn cities_build_request(
    endpoint: *const c_char,
    query: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let Some(query) = c_str(query) else {
            return std::ptr::null_mut();
        };
        let Some(endpoint) = endpoint_or_default(endpoint) else {
            return std::ptr::null_mut();
        };
        let envelope = match SoapRequestBuilder::default().build(query) {
            Ok(envelope) => envelope,
            Err(_) => return std::ptr::null_mut(),
        };
        let client = SoapClient::new(endpoint);
        match client.build_call(&envelope, &envelope.action()) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(err) => {
                tracing::warn!(error = %err, "Could not build SOAP request");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Format the host's response to a `cities_build_request` request.
///
/// A null response, a failed status, or an undecodable body all produce the
/// no-data result for `mode`. Returns null only on an internal panic.
/// Free with `cities_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn cities_parse_response(
    mode: FfiDisplayMode,
    response: *const FfiHttpResponse,
) -> *mut FfiDisplayResult {
    catch_unwind(|| {
        let mode: DisplayMode = mode.into();
        if response.is_null() {
            return FfiDisplayResult::from_core(ResponseFormatter::no_data(mode));
        }
        let resp = unsafe { &*response };
        let core_resp = HttpResponse {
            status: resp.status,
            headers: Vec::new(),
            body: c_str(resp.body).unwrap_or("").to_string(),
        };

        let formatted = SoapClient::new(DEFAULT_ENDPOINT)
            .parse_call(core_resp)
            .and_then(|raw| ResponseFormatter::format(mode, raw.as_ref()));
        let result = formatted.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Response produced no data");
            ResponseFormatter::no_data(mode)
        });
        FfiDisplayResult::from_core(result)
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by `cities_build_request`.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cities_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let slice = std::ptr::slice_from_raw_parts_mut(req.headers, req.headers_len as usize);
            let headers = unsafe { Box::from_raw(slice) };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

/// Free an `FfiDisplayResult` returned by `cities_parse_response`. Results
/// passed to `on_result` are owned by the library and must not be freed.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cities_free_result(result: *mut FfiDisplayResult) {
    if !result.is_null() {
        let _ = catch_unwind(|| free_display_result(result));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
