//! # `hookman` CLI
//!
//! Inspects plugin libraries against a hook catalog and lists installed
//! plugins. Use `hookman --help` for more information.

fn main() -> hookman_cli::CrateResult {
    hookman_cli::run()
}
