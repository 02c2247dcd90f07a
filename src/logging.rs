//! Logging bootstrap for binaries embedding the router core.
//!
//! The core itself only ever calls the `log` facade macros; it never
//! chooses a concrete sink. This module is a convenience for embedders
//! (test harnesses, the router binary) that want the common case.

/// Initialize `env_logger` from `RUST_LOG`, defaulting to `info` for this
/// crate and `warn` for everything else. Safe to call more than once; only
/// the first call has an effect.
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,kovri_core=info"),
    )
    .is_test(false)
    .try_init();
}
