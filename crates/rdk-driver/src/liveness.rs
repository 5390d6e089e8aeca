//! 控制器存活检测
//!
//! RX 线程每收到一条合法消息就按来源记录一次时间。状态推送是控制器持续
//! 发出的唯一数据，单独记录：应答还在回来而推送停了，说明控制器的实时
//! 循环卡住，而不是链路断开。
//!
//! 时间以监视器创建时刻为锚点的微秒数存放在 `AtomicU64` 中，0 表示从未收到。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSource {
    /// 握手应答
    Handshake,
    /// 周期状态推送
    StateFeed,
    /// 请求应答、断开确认、错误消息
    Reply,
}

/// 链路状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// 状态推送在超时窗口内
    Alive,
    /// 控制器仍有应答，但状态推送已超时
    FeedStalled,
    /// 超时窗口内没有任何数据
    Lost,
}

/// 控制器存活监视器
#[derive(Debug)]
pub struct LivenessMonitor {
    anchor: Instant,
    last_any_us: AtomicU64,
    last_feed_us: AtomicU64,
    timeout: Duration,
}

impl LivenessMonitor {
    /// ```
    /// use rdk_driver::liveness::{FeedbackSource, Liveness, LivenessMonitor};
    /// use std::time::Duration;
    ///
    /// let monitor = LivenessMonitor::new(Duration::from_secs(1));
    /// assert_eq!(monitor.liveness(), Liveness::Lost);
    /// monitor.record(FeedbackSource::StateFeed);
    /// assert_eq!(monitor.liveness(), Liveness::Alive);
    /// ```
    pub fn new(timeout: Duration) -> Self {
        Self {
            anchor: Instant::now(),
            last_any_us: AtomicU64::new(0),
            last_feed_us: AtomicU64::new(0),
            timeout,
        }
    }

    /// 锚点以来的微秒数，至少为 1（0 保留给“从未收到”）
    fn now_us(&self) -> u64 {
        (self.anchor.elapsed().as_micros() as u64).max(1)
    }

    fn since(&self, stamp: &AtomicU64) -> Option<Duration> {
        match stamp.load(Ordering::Relaxed) {
            0 => None,
            last => Some(Duration::from_micros(self.now_us().saturating_sub(last))),
        }
    }

    pub fn record(&self, source: FeedbackSource) {
        let now = self.now_us();
        self.last_any_us.store(now, Ordering::Relaxed);
        if source == FeedbackSource::StateFeed {
            self.last_feed_us.store(now, Ordering::Relaxed);
        }
    }

    /// 距离最近一次收到任何数据的时长（从未收到时为 `None`）
    pub fn since_last(&self) -> Option<Duration> {
        self.since(&self.last_any_us)
    }

    /// 距离最近一次状态推送的时长（从未收到时为 `None`）
    pub fn since_last_feed(&self) -> Option<Duration> {
        self.since(&self.last_feed_us)
    }

    pub fn liveness(&self) -> Liveness {
        let within = |age: Option<Duration>| age.is_some_and(|age| age < self.timeout);
        if within(self.since_last_feed()) {
            Liveness::Alive
        } else if within(self.since_last()) {
            Liveness::FeedStalled
        } else {
            Liveness::Lost
        }
    }

    /// 超时窗口内收到过任何数据
    pub fn is_reachable(&self) -> bool {
        self.liveness() != Liveness::Lost
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_nothing_received() {
        let monitor = LivenessMonitor::new(Duration::from_secs(1));
        assert_eq!(monitor.since_last(), None);
        assert_eq!(monitor.since_last_feed(), None);
        assert!(!monitor.is_reachable());
    }

    #[test]
    fn test_handshake_only_is_reachable_but_stalled() {
        let monitor = LivenessMonitor::new(Duration::from_secs(1));
        monitor.record(FeedbackSource::Handshake);
        assert_eq!(monitor.liveness(), Liveness::FeedStalled);
        assert!(monitor.is_reachable());
        assert_eq!(monitor.since_last_feed(), None);
    }

    #[test]
    fn test_feed_stall_then_loss() {
        let monitor = LivenessMonitor::new(Duration::from_millis(40));
        monitor.record(FeedbackSource::StateFeed);
        assert_eq!(monitor.liveness(), Liveness::Alive);

        thread::sleep(Duration::from_millis(60));
        monitor.record(FeedbackSource::Reply);
        assert_eq!(monitor.liveness(), Liveness::FeedStalled);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(monitor.liveness(), Liveness::Lost);
        assert!(monitor.since_last_feed().unwrap() >= Duration::from_millis(120));
    }
}
