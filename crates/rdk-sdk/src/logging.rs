//! 日志初始化
//!
//! 安装 `tracing-subscriber`（`EnvFilter`，遵循 `RUST_LOG`），
//! 并把 `log` crate 的记录桥接到 `tracing`。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 以 `info` 为默认级别初始化日志
///
/// 可以重复调用，只有第一次生效。
pub fn init_logger() {
    init_logger_with_filter("info");
}

/// 初始化日志，`RUST_LOG` 未设置时使用 `default_directives`（如 `"rdk_driver=debug,info"`）
pub fn init_logger_with_filter(default_directives: &str) {
    INIT.call_once(|| {
        let _ = tracing_log::LogTracer::init();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("A global tracing subscriber is already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_is_idempotent() {
        init_logger();
        init_logger_with_filter("debug");
        // log 记录经桥接输出，不会 panic
        log::info!("log record bridged to tracing");
        tracing::info!("tracing event");
    }
}
