//! 本地模式镜像
//!
//! 控制器的当前模式在本地以原子变量镜像，指令发送前的模式检查无需往返。
//! `SetMode` 成功后更新；`GetMode` 查询后刷新。

use rdk_protocol::Mode;
use std::sync::atomic::{AtomicU8, Ordering};

/// 控制模式（原子版本，用于线程间共享）
///
/// # 示例
///
/// ```rust
/// use rdk_driver::mode::AtomicMode;
/// use rdk_protocol::Mode;
/// use std::sync::atomic::Ordering;
///
/// let mode = AtomicMode::new(Mode::Idle);
/// mode.set(Mode::RtJointTorque, Ordering::Release);
/// assert_eq!(mode.get(Ordering::Acquire), Mode::RtJointTorque);
/// ```
#[derive(Debug)]
pub struct AtomicMode {
    inner: AtomicU8,
}

impl AtomicMode {
    pub fn new(mode: Mode) -> Self {
        Self {
            inner: AtomicU8::new(mode.as_u8()),
        }
    }

    /// 获取当前模式（无效值解析为 `Mode::Unknown`）
    pub fn get(&self, ordering: Ordering) -> Mode {
        Mode::from(self.inner.load(ordering))
    }

    pub fn set(&self, mode: Mode, ordering: Ordering) {
        self.inner.store(mode.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 如果当前值等于 `current`，则设置为 `new` 并返回 true
    pub fn compare_exchange(
        &self,
        current: Mode,
        new: Mode,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicMode {
    fn default() -> Self {
        Self::new(Mode::Unknown)
    }
}

impl Clone for AtomicMode {
    fn clone(&self) -> Self {
        Self::new(self.get(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_mode() {
        let mode = AtomicMode::new(Mode::Idle);
        assert_eq!(mode.get(Ordering::Relaxed), Mode::Idle);

        mode.set(Mode::NrtPlanExecution, Ordering::Relaxed);
        assert_eq!(mode.get(Ordering::Relaxed), Mode::NrtPlanExecution);

        assert!(mode.compare_exchange(
            Mode::NrtPlanExecution,
            Mode::Idle,
            Ordering::Relaxed,
            Ordering::Relaxed
        ));
        assert_eq!(mode.get(Ordering::Relaxed), Mode::Idle);

        // 期望值不匹配
        assert!(!mode.compare_exchange(
            Mode::RtJointTorque,
            Mode::RtJointPosition,
            Ordering::Relaxed,
            Ordering::Relaxed
        ));
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(AtomicMode::default().get(Ordering::Relaxed), Mode::Unknown);
    }
}
