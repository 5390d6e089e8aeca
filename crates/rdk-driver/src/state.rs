//! 状态结构定义
//!
//! 状态推送帧由 RX 线程整帧解码后以 `ArcSwap::store` 一次性发布，
//! 读者看到的每个快照中所有数组都来自同一个控制周期。

use crate::liveness::{FeedbackSource, LivenessMonitor};
use crate::mode::AtomicMode;
use arc_swap::ArcSwap;
use rdk_protocol::{Mode, RobotStates, StateFeed, StatusFlags};
use std::time::{Duration, Instant};
use tracing::warn;

/// 周期回退超过该值视为控制器重启
pub const MAX_REORDER_CYCLES: u64 = 1000;

/// 机器人状态快照
///
/// 首个状态推送帧到达之前为默认值（`cycle == 0`，数组全零，位姿为单位位姿）。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RobotStateSnapshot {
    /// 控制周期计数（0 表示尚未收到状态）
    pub cycle: u64,
    /// 控制器时间戳（微秒）
    pub timestamp_us: u64,
    /// 同周期采样的状态位
    pub status: StatusFlags,
    /// 状态数组
    pub states: RobotStates,
    /// 本地接收时刻
    pub received_at: Option<Instant>,
}

impl RobotStateSnapshot {
    pub fn from_feed(feed: &StateFeed, received_at: Instant) -> Self {
        Self {
            cycle: feed.cycle,
            timestamp_us: feed.timestamp_us,
            status: feed.status,
            states: feed.states,
            received_at: Some(received_at),
        }
    }

    /// 是否已收到过状态推送
    pub fn is_valid(&self) -> bool {
        self.cycle > 0
    }

    /// 距离接收时刻的时长（未收到状态时为 `None`）
    pub fn age(&self) -> Option<Duration> {
        self.received_at.map(|t| t.elapsed())
    }
}

/// 共享状态上下文
pub struct RobotContext {
    /// 最新状态快照（热数据，无锁读取）
    pub snapshot: ArcSwap<RobotStateSnapshot>,
    /// 控制器存活检测
    pub monitor: LivenessMonitor,
    /// 本地镜像的控制模式
    pub mode: AtomicMode,
}

impl RobotContext {
    /// 创建新的上下文
    ///
    /// ```
    /// use rdk_driver::RobotContext;
    /// use std::time::Duration;
    ///
    /// let ctx = RobotContext::new(Duration::from_secs(1));
    /// assert_eq!(ctx.snapshot.load().cycle, 0);
    /// ```
    pub fn new(connection_timeout: Duration) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RobotStateSnapshot::default()),
            monitor: LivenessMonitor::new(connection_timeout),
            mode: AtomicMode::new(Mode::Unknown),
        }
    }

    /// 发布一个状态推送帧的快照，并记录推送到达
    ///
    /// 周期不增加时一般是重复或乱序的数据报，丢弃。以下情况视为控制器重启、
    /// 周期计数归零，照常发布：
    /// - 周期回退超过 [`MAX_REORDER_CYCLES`]
    /// - 上一帧推送距今已超过连接超时
    pub fn publish(&self, snapshot: RobotStateSnapshot) -> PublishOutcome {
        let feed_gap = self.monitor.since_last_feed();
        self.monitor.record(FeedbackSource::StateFeed);

        let current = self.snapshot.load().cycle;
        let outcome = if snapshot.cycle > current {
            PublishOutcome::Published
        } else if current - snapshot.cycle > MAX_REORDER_CYCLES
            || feed_gap.is_some_and(|gap| gap >= self.monitor.timeout())
        {
            warn!(
                "Controller cycle counter went back from {} to {}, assuming a controller restart",
                current, snapshot.cycle
            );
            PublishOutcome::Restarted
        } else {
            return PublishOutcome::Discarded;
        };

        self.snapshot.store(std::sync::Arc::new(snapshot));
        outcome
    }
}

/// [`RobotContext::publish`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// 控制器重启后周期重新计数
    Restarted,
    /// 重复或乱序，未发布
    Discarded,
}

impl PublishOutcome {
    pub fn is_published(self) -> bool {
        self != PublishOutcome::Discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(cycle: u64) -> StateFeed {
        let mut states = RobotStates::default();
        states.q = [cycle as f64; 7];
        StateFeed {
            cycle,
            timestamp_us: cycle * 1000,
            status: StatusFlags::from_byte(1),
            states,
        }
    }

    #[test]
    fn test_default_snapshot() {
        let snapshot = RobotStateSnapshot::default();
        assert!(!snapshot.is_valid());
        assert!(snapshot.age().is_none());
        assert_eq!(snapshot.states.tcp_pose[3], 1.0);
    }

    #[test]
    fn test_publish_rejects_out_of_order() {
        let ctx = RobotContext::new(Duration::from_secs(1));
        let now = Instant::now();
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(2), now)),
            PublishOutcome::Published
        );
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(1), now)),
            PublishOutcome::Discarded
        );
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(2), now)),
            PublishOutcome::Discarded
        );

        let snapshot = ctx.snapshot.load();
        assert_eq!(snapshot.cycle, 2);
        assert_eq!(snapshot.states.q, [2.0; 7]);
        assert!(snapshot.status.operational());
    }

    #[test]
    fn test_large_cycle_drop_is_a_restart() {
        let ctx = RobotContext::new(Duration::from_secs(1));
        let now = Instant::now();
        ctx.publish(RobotStateSnapshot::from_feed(&feed(50_000), now));

        // 少量回退仍按乱序丢弃
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(49_990), now)),
            PublishOutcome::Discarded
        );
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(1), now)),
            PublishOutcome::Restarted
        );
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(2), now)),
            PublishOutcome::Published
        );
        assert_eq!(ctx.snapshot.load().states.q, [2.0; 7]);
    }

    #[test]
    fn test_feed_gap_accepts_small_cycle_drop() {
        let ctx = RobotContext::new(Duration::from_millis(30));
        let now = Instant::now();
        ctx.publish(RobotStateSnapshot::from_feed(&feed(40), now));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(
            ctx.publish(RobotStateSnapshot::from_feed(&feed(3), Instant::now())),
            PublishOutcome::Restarted
        );
        assert_eq!(ctx.snapshot.load().cycle, 3);
    }
}
