//! 故障恢复
//!
//! 故障时请求清除，等待一段时间后复查；仍然故障则返回 [`RobotError::Fault`]。
//! 只尝试一次，不自动重试。

use crate::readiness::Clock;
use crate::types::{Result, RobotError};
use std::time::Duration;
use tracing::{error, info, warn};

/// 可查询和清除故障的对象
pub trait FaultControl {
    fn is_fault(&self) -> bool;
    fn clear_fault(&self) -> Result<()>;
}

/// 恢复结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// 本来就没有故障
    NoFault,
    /// 故障已清除
    Cleared,
}

/// 检查故障，必要时清除并在 `wait` 后复查
pub fn recover_from_fault(
    robot: &impl FaultControl,
    clock: &dyn Clock,
    wait: Duration,
) -> Result<RecoveryOutcome> {
    if !robot.is_fault() {
        return Ok(RecoveryOutcome::NoFault);
    }

    warn!("Fault present, trying to clear it");
    robot.clear_fault()?;
    clock.sleep(wait);

    if robot.is_fault() {
        error!("Fault still present {:?} after clear request", wait);
        return Err(RobotError::Fault(
            "fault persists after clear_fault".to_string(),
        ));
    }

    info!("Fault cleared");
    Ok(RecoveryOutcome::Cleared)
}
