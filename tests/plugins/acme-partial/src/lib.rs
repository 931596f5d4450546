//! Test plugin implementing only `friction_factor`, without id or version
//! markers.

use std::ffi::c_int;

#[unsafe(no_mangle)]
pub extern "C" fn acme_v1_friction_factor(v1: c_int, v2: c_int) -> c_int {
    v1 * v2
}
