//! 使能后的就绪轮询
//!
//! `enable` 是异步的：控制器收到指令后需要一段时间才进入可操作状态。
//! [`ReadinessMonitor`] 按固定间隔轮询 `is_operational`，最多 `max_polls` 次：
//!
//! ```text
//! Enabling ──operational──▶ Operational
//!    │  ├──第 max_polls 次仍未就绪──▶ TimedOut
//!    │  └──取消标志置位──▶ Cancelled
//! ```
//!
//! 时钟通过 [`Clock`] 注入，测试使用 [`ManualClock`]，不真实等待。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 时钟抽象
pub trait Clock: Send + Sync {
    /// 自时钟创建以来经过的时间
    fn elapsed(&self) -> Duration;

    /// 阻塞当前线程指定时长
    fn sleep(&self, duration: Duration);
}

/// 系统时钟（`spin_sleep` 精确睡眠）
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}

/// 手动时钟：`sleep` 立即返回并推进虚拟时间
///
/// ```
/// use rdk_client::readiness::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.sleep(Duration::from_secs(2));
/// assert_eq!(clock.elapsed(), Duration::from_secs(2));
/// assert_eq!(clock.sleep_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed_ns: AtomicU64,
    sleeps: AtomicU32,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接推进虚拟时间（不计入 `sleep_count`）
    pub fn advance(&self, duration: Duration) {
        self.elapsed_ns.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// `sleep` 被调用的次数
    pub fn sleep_count(&self) -> u32 {
        self.sleeps.load(Ordering::Relaxed)
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Relaxed))
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        self.advance(duration);
    }
}

/// 就绪轮询配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 最多轮询次数
    pub max_polls: u32,
    /// 清除故障后等待多久再复查
    pub fault_clear_wait: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_polls: 10,
            fault_clear_wait: Duration::from_secs(2),
        }
    }
}

impl ReadinessConfig {
    /// 由总等待时长推算轮询次数（至少 1 次）
    pub fn with_max_wait(poll_interval: Duration, max_wait: Duration) -> Self {
        let max_polls = if poll_interval.is_zero() {
            1
        } else {
            (max_wait.as_nanos() / poll_interval.as_nanos()).clamp(1, u32::MAX as u128) as u32
        };
        Self {
            poll_interval,
            max_polls,
            ..Self::default()
        }
    }

    /// 最长等待时长（溢出时为 `Duration::MAX`）
    pub fn max_wait(&self) -> Duration {
        self.poll_interval.checked_mul(self.max_polls).unwrap_or(Duration::MAX)
    }
}

/// 就绪状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Enabling,
    Operational,
    TimedOut,
    Cancelled,
}

impl ReadinessState {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReadinessState::Enabling)
    }
}

/// 就绪轮询器
///
/// 每个 tick：睡眠一个轮询间隔，检查取消标志，调用一次探针。
/// 进入终止状态后不再轮询。
pub struct ReadinessMonitor<'a> {
    config: ReadinessConfig,
    clock: &'a dyn Clock,
    cancel: Option<&'a AtomicBool>,
    state: ReadinessState,
    polls: u32,
}

impl<'a> ReadinessMonitor<'a> {
    pub fn new(config: ReadinessConfig, clock: &'a dyn Clock) -> Self {
        Self {
            config,
            clock,
            cancel: None,
            state: ReadinessState::Enabling,
            polls: 0,
        }
    }

    /// 设置取消标志（置为 `true` 后下一个 tick 进入 `Cancelled`）
    pub fn with_cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// 已执行的轮询次数
    pub fn polls(&self) -> u32 {
        self.polls
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// 执行一个 tick
    pub fn tick(&mut self, is_operational: impl FnOnce() -> bool) -> ReadinessState {
        if self.state.is_terminal() {
            return self.state;
        }

        self.clock.sleep(self.config.poll_interval);

        if self.is_cancelled() {
            info!("Readiness wait cancelled after {} polls", self.polls);
            self.state = ReadinessState::Cancelled;
            return self.state;
        }

        self.polls += 1;
        if is_operational() {
            info!("Robot operational after {} polls", self.polls);
            self.state = ReadinessState::Operational;
        } else if self.polls >= self.config.max_polls {
            warn!(
                "Robot not operational after {} polls ({:?})",
                self.polls,
                self.config.max_wait()
            );
            self.state = ReadinessState::TimedOut;
        } else {
            debug!("Robot not operational yet (poll {}/{})", self.polls, self.config.max_polls);
        }
        self.state
    }

    /// 一直 tick 到终止状态
    pub fn run(&mut self, mut is_operational: impl FnMut() -> bool) -> ReadinessState {
        while !self.state.is_terminal() {
            self.tick(&mut is_operational);
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn config() -> ReadinessConfig {
        ReadinessConfig::default()
    }

    #[test]
    fn test_operational_on_third_poll() {
        let clock = ManualClock::new();
        let calls = Cell::new(0u32);
        let mut monitor = ReadinessMonitor::new(config(), &clock);

        let state = monitor.run(|| {
            calls.set(calls.get() + 1);
            calls.get() == 3
        });

        assert_eq!(state, ReadinessState::Operational);
        assert_eq!(monitor.polls(), 3);
        assert_eq!(calls.get(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_never_operational_times_out() {
        let clock = ManualClock::new();
        let calls = Cell::new(0u32);
        let mut monitor = ReadinessMonitor::new(config(), &clock);

        let state = monitor.run(|| {
            calls.set(calls.get() + 1);
            false
        });

        assert_eq!(state, ReadinessState::TimedOut);
        assert_eq!(calls.get(), 10);
        assert_eq!(clock.sleep_count(), 10);

        // 终止后不再轮询
        monitor.tick(|| panic!("polled after termination"));
        assert_eq!(monitor.polls(), 10);
    }

    #[test]
    fn test_cancel_stops_before_poll() {
        let clock = ManualClock::new();
        let cancel = AtomicBool::new(false);
        let mut monitor = ReadinessMonitor::new(config(), &clock).with_cancel_flag(&cancel);

        assert_eq!(monitor.tick(|| false), ReadinessState::Enabling);
        cancel.store(true, Ordering::Release);
        assert_eq!(
            monitor.tick(|| panic!("polled after cancel")),
            ReadinessState::Cancelled
        );
        assert_eq!(monitor.polls(), 1);
    }

    #[test]
    fn test_with_max_wait() {
        let config =
            ReadinessConfig::with_max_wait(Duration::from_millis(250), Duration::from_secs(1));
        assert_eq!(config.max_polls, 4);
        assert_eq!(config.max_wait(), Duration::from_secs(1));

        let config = ReadinessConfig::with_max_wait(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(config.max_polls, 1);
    }

    #[test]
    fn test_max_wait_saturates() {
        let config = ReadinessConfig {
            poll_interval: Duration::from_secs(u64::MAX / 2),
            max_polls: u32::MAX,
            ..ReadinessConfig::default()
        };
        assert_eq!(config.max_wait(), Duration::MAX);
    }

    #[test]
    fn test_system_clock_sleeps() {
        let clock = SystemClock::new();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.elapsed() >= Duration::from_millis(5));
    }

    proptest! {
        #[test]
        fn prop_polls_exactly_until_operational(ready_on in 1u32..=10) {
            let clock = ManualClock::new();
            let calls = Cell::new(0u32);
            let mut monitor = ReadinessMonitor::new(config(), &clock);
            let state = monitor.run(|| {
                calls.set(calls.get() + 1);
                calls.get() >= ready_on
            });
            prop_assert_eq!(state, ReadinessState::Operational);
            prop_assert_eq!(calls.get(), ready_on);
            prop_assert_eq!(clock.elapsed(), Duration::from_secs(ready_on as u64));
        }

        #[test]
        fn prop_never_exceeds_max_polls(max_polls in 1u32..50) {
            let clock = ManualClock::new();
            let calls = Cell::new(0u32);
            let config = ReadinessConfig { max_polls, ..config() };
            let mut monitor = ReadinessMonitor::new(config, &clock);
            let state = monitor.run(|| {
                calls.set(calls.get() + 1);
                false
            });
            prop_assert_eq!(state, ReadinessState::TimedOut);
            prop_assert_eq!(calls.get(), max_polls);
        }
    }
}
