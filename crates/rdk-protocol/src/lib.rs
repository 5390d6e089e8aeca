//! # RDK Protocol
//!
//! 机器人控制器 UDP 线协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `message`: 消息头、消息类型、编码/解码
//! - `request`: 请求操作码与请求体
//! - `mode`: 控制模式
//! - `state`: 状态快照（定长数组）
//! - `status`: 状态位域
//! - `plan`: 任务/原语/全局变量
//! - `info`: 机器人静态信息
//!
//! ## 字节序
//!
//! 协议统一使用小端字节序（Little Endian），字符串为 `u16` 长度前缀 + UTF-8。

pub mod codec;
pub mod info;
pub mod message;
pub mod mode;
pub mod plan;
pub mod request;
pub mod state;
pub mod status;

// 重新导出常用类型
pub use info::RobotInfo;
pub use message::*;
pub use mode::Mode;
pub use plan::{GlobalVariables, PlanInfo, PrimitiveStates};
pub use request::*;
pub use state::*;
pub use status::StatusFlags;

use thiserror::Error;

/// 控制器默认 UDP 端口（机器人地址未指定端口时使用）
pub const DEFAULT_CONTROLLER_PORT: u16 = 9880;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Message too short")]
    TooShort,

    #[error("Invalid message length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),

    #[error("Invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Message too long: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },
}

/// 协议版本（随 Connect/ConnectAck 交换）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.major, self.minor, self.patch]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// 本实现使用的协议版本
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 2, 0);

/// 小端字节序转 u32
pub fn bytes_to_u32_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// 小端字节序转 u16
pub fn bytes_to_u16_le(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_u32_le() {
        let bytes = [0x78, 0x56, 0x34, 0x12];
        assert_eq!(bytes_to_u32_le(bytes), 0x12345678);
    }

    #[test]
    fn test_bytes_to_u16_le() {
        assert_eq!(bytes_to_u16_le([0x34, 0x12]), 0x1234);
    }

    #[test]
    fn test_protocol_version_display() {
        let version = ProtocolVersion::new(1, 2, 3);
        assert_eq!(version.to_string(), "1.2.3");
        assert_eq!(ProtocolVersion::from_bytes(version.to_bytes()), version);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidLength {
            expected: 8,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Invalid message length: expected 8, got 4");

        let err = ProtocolError::InvalidOpcode(0xAB);
        assert_eq!(err.to_string(), "Invalid opcode: 0xAB");
    }
}
