//! 控制器状态位域
//!
//! 由 `GetStatus` 响应和每个状态推送帧携带，1 字节：
//! - Bit 0: 可操作（operational）
//! - Bit 1: 忙（正在执行任务/原语）
//! - Bit 2: 故障
//! - Bit 3: 急停已释放
//! - Bit 4: 处于恢复状态
//! - Bit 5: 已停止
//! - Bit 6-7: 保留

use bilge::prelude::*;

#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq)]
pub struct StatusFlags {
    pub operational: bool,    // Bit 0
    pub busy: bool,           // Bit 1
    pub fault: bool,          // Bit 2
    pub estop_released: bool, // Bit 3
    pub recovery_state: bool, // Bit 4
    pub stopped: bool,        // Bit 5
    pub reserved: u2,         // Bit 6-7: 保留
}

impl StatusFlags {
    /// 从线值解析
    pub fn from_byte(byte: u8) -> Self {
        Self::from(u8::new(byte))
    }

    /// 编码为线值
    pub fn to_byte(self) -> u8 {
        u8::from(self).value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flags_bits() {
        let flags = StatusFlags::from_byte(0b0000_1001);
        assert!(flags.operational());
        assert!(!flags.busy());
        assert!(!flags.fault());
        assert!(flags.estop_released());
        assert!(!flags.recovery_state());
        assert!(!flags.stopped());
    }

    #[test]
    fn test_status_flags_setters() {
        let mut flags = StatusFlags::from_byte(0);
        flags.set_fault(true);
        flags.set_stopped(true);
        assert_eq!(flags.to_byte(), 0b0010_0100);
    }
}
