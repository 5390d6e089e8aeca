//! 驱动性能指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 驱动实时指标
///
/// ```rust
/// use rdk_driver::DriverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DriverMetrics::new();
/// metrics.rx_datagrams_total.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().rx_datagrams_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// RX 接收的数据报总数
    pub rx_datagrams_total: AtomicU64,
    /// RX 状态推送帧数
    pub rx_state_feeds: AtomicU64,
    /// RX 应答数（匹配当前请求）
    pub rx_replies: AtomicU64,
    /// RX 丢弃的过期应答数（序列号不匹配）
    pub rx_stale_replies: AtomicU64,
    /// RX 无法解码的数据报数
    pub rx_invalid: AtomicU64,
    /// RX 超时次数（正常现象，无数据时会超时）
    pub rx_timeouts: AtomicU64,
    /// TX 请求数
    pub tx_requests: AtomicU64,
    /// TX 流式指令数
    pub tx_streams: AtomicU64,
    /// TX 心跳数
    pub tx_heartbeats: AtomicU64,
    /// TX 发送失败次数
    pub tx_errors: AtomicU64,
    /// 请求等待应答超时次数
    pub request_timeouts: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_datagrams_total: self.rx_datagrams_total.load(Ordering::Relaxed),
            rx_state_feeds: self.rx_state_feeds.load(Ordering::Relaxed),
            rx_replies: self.rx_replies.load(Ordering::Relaxed),
            rx_stale_replies: self.rx_stale_replies.load(Ordering::Relaxed),
            rx_invalid: self.rx_invalid.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_requests: self.tx_requests.load(Ordering::Relaxed),
            tx_streams: self.tx_streams.load(Ordering::Relaxed),
            tx_heartbeats: self.tx_heartbeats.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.rx_datagrams_total.store(0, Ordering::Relaxed);
        self.rx_state_feeds.store(0, Ordering::Relaxed);
        self.rx_replies.store(0, Ordering::Relaxed);
        self.rx_stale_replies.store(0, Ordering::Relaxed);
        self.rx_invalid.store(0, Ordering::Relaxed);
        self.rx_timeouts.store(0, Ordering::Relaxed);
        self.tx_requests.store(0, Ordering::Relaxed);
        self.tx_streams.store(0, Ordering::Relaxed);
        self.tx_heartbeats.store(0, Ordering::Relaxed);
        self.tx_errors.store(0, Ordering::Relaxed);
        self.request_timeouts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_datagrams_total: u64,
    pub rx_state_feeds: u64,
    pub rx_replies: u64,
    pub rx_stale_replies: u64,
    pub rx_invalid: u64,
    pub rx_timeouts: u64,
    pub tx_requests: u64,
    pub tx_streams: u64,
    pub tx_heartbeats: u64,
    pub tx_errors: u64,
    pub request_timeouts: u64,
}

impl MetricsSnapshot {
    /// 无效数据报比例（百分比）
    pub fn invalid_rate(&self) -> f64 {
        if self.rx_datagrams_total == 0 {
            return 0.0;
        }
        (self.rx_invalid as f64 / self.rx_datagrams_total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = DriverMetrics::new();
        metrics.rx_datagrams_total.fetch_add(4, Ordering::Relaxed);
        metrics.rx_invalid.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_datagrams_total, 4);
        assert!((snapshot.invalid_rate() - 25.0).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot().rx_datagrams_total, 0);
        assert_eq!(metrics.snapshot().invalid_rate(), 0.0);
    }
}
