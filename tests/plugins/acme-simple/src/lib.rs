//! Test plugin implementing every hook of the `acme` v1 catalog used by the
//! integration tests, plus the version and id markers.

use std::ffi::{c_char, c_int};

/// Friction factor: `v1 + v2`.
#[unsafe(no_mangle)]
pub extern "C" fn acme_v1_friction_factor(v1: c_int, v2: c_int) -> c_int {
    v1 + v2
}

/// Environment temperature: `v3 * v4`.
#[unsafe(no_mangle)]
pub extern "C" fn acme_v1_env_temperature(v3: f64, v4: f64) -> f64 {
    v3 * v4
}

#[unsafe(no_mangle)]
pub extern "C" fn acme_version_api() -> *const c_char {
    c"v1".as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn get_plugin_id() -> *const c_char {
    c"acme_simple".as_ptr()
}
