//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Default Scaleway commercial type for CPU benchmarks.
pub const CPU_INSTANCE_TYPE: &str = "POP2-HC-16C-32G";

/// Default Scaleway commercial type for GPU benchmarks.
pub const GPU_INSTANCE_TYPE: &str = "GPU-3070-S";
