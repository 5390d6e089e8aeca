//! Observer - 状态读取器
//!
//! 只读视图，直接读取驱动发布的最新快照：无锁、不阻塞、无副作用。
//! 可以克隆后交给其他线程，不会延长会话的生命周期。

use rdk_driver::{Liveness, RobotContext, RobotStateSnapshot};
use rdk_protocol::{JOINT_DOF, Mode, POSE_LEN, StatusFlags, WRENCH_LEN};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// 状态观察器
#[derive(Clone)]
pub struct Observer {
    ctx: Arc<RobotContext>,
}

impl Observer {
    pub fn new(ctx: Arc<RobotContext>) -> Self {
        Self { ctx }
    }

    /// 最新状态快照
    ///
    /// 首个状态推送帧到达之前返回默认快照（`cycle == 0`）。
    pub fn get_state(&self) -> RobotStateSnapshot {
        **self.ctx.snapshot.load()
    }

    /// 最新状态推送帧携带的状态位
    pub fn status(&self) -> StatusFlags {
        self.ctx.snapshot.load().status
    }

    pub fn joint_positions(&self) -> [f64; JOINT_DOF] {
        self.ctx.snapshot.load().states.q
    }

    pub fn joint_torques(&self) -> [f64; JOINT_DOF] {
        self.ctx.snapshot.load().states.tau
    }

    pub fn tcp_pose(&self) -> [f64; POSE_LEN] {
        self.ctx.snapshot.load().states.tcp_pose
    }

    pub fn external_wrench_in_base(&self) -> [f64; WRENCH_LEN] {
        self.ctx.snapshot.load().states.ext_wrench_in_base
    }

    /// 本地镜像的控制模式
    pub fn mode(&self) -> Mode {
        self.ctx.mode.get(Ordering::Acquire)
    }

    /// 距离最近一次收到控制器数据的时长（从未收到时为 `None`）
    pub fn time_since_last_feedback(&self) -> Option<Duration> {
        self.ctx.monitor.since_last()
    }

    /// 链路状态（状态推送是否仍在到达）
    pub fn liveness(&self) -> Liveness {
        self.ctx.monitor.liveness()
    }
}
