//! Windows local-account authenticator for a multi-user notebook hub:
//! login verification, group gating, and per-user profile load/unload around
//! each workload.

pub mod config;
pub mod error;
pub mod identity;
pub mod lane;
pub mod platform;

// Test-only printing helper: expands to eprintln! in debug builds and is absent otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
