use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::sync::Once;

// ggml_log_level values.
const GGML_LOG_LEVEL_WARN: u32 = 3;
const GGML_LOG_LEVEL_ERROR: u32 = 4;

/// Route whisper.cpp diagnostics into `tracing`. Left alone, the library prints to stderr
/// unfiltered; model-load chatter lands at `debug`.
unsafe extern "C" fn forward_to_tracing(level: u32, c_msg: *const c_char, _user_data: *mut c_void) {
    if c_msg.is_null() {
        return;
    }
    // SAFETY: whisper.cpp passes a NUL-terminated string valid for the duration of the call.
    let msg = unsafe { CStr::from_ptr(c_msg) }.to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() {
        return;
    }

    match level {
        GGML_LOG_LEVEL_ERROR => tracing::error!(target: "whisper_cpp", "{msg}"),
        GGML_LOG_LEVEL_WARN => tracing::warn!(target: "whisper_cpp", "{msg}"),
        _ => tracing::debug!(target: "whisper_cpp", "{msg}"),
    }
}

pub(super) fn install_log_hook() {
    static INIT: Once = Once::new();

    INIT.call_once(|| unsafe {
        whisper_rs::set_log_callback(Some(forward_to_tracing), std::ptr::null_mut());
    });
}
