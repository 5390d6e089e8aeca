//! 流式控制循环
//!
//! RT 模式要求调用方以控制器的实时周期持续发送指令。
//! [`run_stream_loop`] 使用绝对时间锚点调度，消除累积漂移：
//! 每次迭代先设定下一个锚点，执行 `step`，再用 `spin_sleep` 睡到锚点。
//! `step` 超时（Overrun）时不睡眠，并把锚点重置到当前时刻。
//!
//! ```no_run
//! use rdk_client::control::{LoopConfig, run_stream_loop};
//! use rdk_client::{Mode, RobotSession};
//! use std::ops::ControlFlow;
//!
//! # fn main() -> rdk_client::Result<()> {
//! let session = RobotSession::connect("192.168.2.100", "192.168.2.35")?;
//! session.set_mode(Mode::RtJointTorque)?;
//! let config = LoopConfig { max_iterations: Some(5000), ..LoopConfig::default() };
//! let stats = run_stream_loop(&config, None, |_| {
//!     session.stream_joint_torque([0.0; 7], true, true)?;
//!     Ok(ControlFlow::Continue(()))
//! })?;
//! println!("{} overruns", stats.overruns);
//! # Ok(())
//! # }
//! ```

use crate::types::{Result, RobotError};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 循环频率（Hz）
    pub frequency_hz: f64,
    /// 最大迭代次数，`None` 表示直到 `step` 返回 `Break` 或被取消
    pub max_iterations: Option<u64>,
    /// 超时时记录警告
    pub warn_on_overrun: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            max_iterations: None,
            warn_on_overrun: true,
        }
    }
}

impl LoopConfig {
    pub fn period(&self) -> Result<Duration> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(RobotError::InvalidInput(format!(
                "loop frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        Duration::try_from_secs_f64(1.0 / self.frequency_hz).map_err(|_| {
            RobotError::InvalidInput(format!(
                "loop frequency {} Hz gives a period out of range",
                self.frequency_hz
            ))
        })
    }
}

/// 循环统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// 完成的迭代次数
    pub iterations: u64,
    /// `step` 耗时超过周期的次数
    pub overruns: u64,
    /// 单次 `step` 最长耗时
    pub max_step_time: Duration,
    /// 总耗时
    pub elapsed: Duration,
}

/// 以固定频率调用 `step`（参数为迭代序号，从 0 开始）
///
/// 以下任一情况结束循环：`step` 返回错误（原样返回）、返回
/// `ControlFlow::Break`、达到 `max_iterations`、取消标志被置位。
pub fn run_stream_loop<F>(
    config: &LoopConfig,
    cancel: Option<&AtomicBool>,
    mut step: F,
) -> Result<LoopStats>
where
    F: FnMut(u64) -> Result<ControlFlow<()>>,
{
    let period = config.period()?;
    let start = Instant::now();
    let mut stats = LoopStats::default();
    let mut next_tick = start;

    loop {
        if config.max_iterations.is_some_and(|max| stats.iterations >= max) {
            break;
        }
        if cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            debug!("Stream loop cancelled after {} iterations", stats.iterations);
            break;
        }

        // 1. 设定下一个锚点（绝对时间）
        next_tick = next_tick.checked_add(period).ok_or_else(|| {
            RobotError::InvalidInput(format!("loop period {:?} is out of range", period))
        })?;

        // 2. 执行一步
        let step_start = Instant::now();
        let flow = step(stats.iterations)?;
        stats.iterations += 1;
        stats.max_step_time = stats.max_step_time.max(step_start.elapsed());

        if flow.is_break() {
            break;
        }

        // 3. 睡眠到下一个锚点
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            stats.overruns += 1;
            if config.warn_on_overrun {
                warn!(
                    "Stream loop overrun at iteration {}: behind schedule by {:?} (period {:?})",
                    stats.iterations,
                    now.duration_since(next_tick),
                    period
                );
            }
            next_tick = now;
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
