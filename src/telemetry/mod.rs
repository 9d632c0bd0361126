//! 日志初始化：基于 `RUST_LOG` 的可选订阅者安装（库本身从不自动安装）。
//!
//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the application. [`init_tracing`] is a convenience for binaries and tests
//! that want `RUST_LOG`-controlled output without further setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "content_fetch=info";

/// Install a formatted subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; returns `false` if a global subscriber was
/// already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .is_ok()
}
