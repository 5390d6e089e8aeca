//! 客户端错误类型

use rdk_driver::DriverError;
use rdk_protocol::{ErrorCode, Mode, ProtocolError};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RobotError>;

/// 会话层错误
#[derive(Error, Debug)]
pub enum RobotError {
    /// 无法建立会话（不可达、被拒绝、协议版本不兼容）
    #[error("Connection failed: {0}")]
    Connection(#[source] DriverError),

    /// 机器人处于故障状态且无法清除
    #[error("Robot fault: {0}")]
    Fault(String),

    /// 会话已断开
    #[error("Session is closed")]
    InvalidSession,

    /// 当前模式不允许此操作
    #[error("{operation} requires mode {required:?}, current mode is {current}")]
    InvalidMode {
        operation: String,
        required: &'static [Mode],
        current: Mode,
    },

    #[error("Operation timeout: {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// 等待被调用方取消
    #[error("Operation cancelled")]
    Cancelled,

    /// 参数不合法（在发送前拒绝）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 控制器拒绝请求
    #[error("Controller rejected request ({code}): {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),
}

impl RobotError {
    /// 将请求过程中的驱动错误映射为会话层错误
    pub(crate) fn from_request(error: DriverError, request_timeout: Duration) -> Self {
        match error {
            DriverError::NotConnected => RobotError::InvalidSession,
            DriverError::Timeout => RobotError::Timeout {
                timeout_ms: request_timeout.as_millis() as u64,
            },
            DriverError::Rejected {
                code: ErrorCode::Fault,
                message,
            } => RobotError::Fault(message),
            DriverError::Rejected { code, message } => RobotError::Rejected { code, message },
            // 编码阶段就超出数据报上限，没有发送任何数据
            DriverError::Protocol(e @ ProtocolError::TooLong { .. }) => {
                RobotError::InvalidInput(e.to_string())
            },
            other => RobotError::Driver(other),
        }
    }

    /// 致命错误：会话无法继续使用
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RobotError::Connection(_) | RobotError::InvalidSession | RobotError::Fault(_)
        )
    }

    /// 可重试：同一操作稍后重试可能成功
    pub fn is_retryable(&self) -> bool {
        match self {
            RobotError::Timeout { .. } => true,
            RobotError::Rejected { code, .. } => *code == ErrorCode::Busy,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request_mapping() {
        let timeout = Duration::from_millis(250);
        assert!(matches!(
            RobotError::from_request(DriverError::NotConnected, timeout),
            RobotError::InvalidSession
        ));
        assert!(matches!(
            RobotError::from_request(DriverError::Timeout, timeout),
            RobotError::Timeout { timeout_ms: 250 }
        ));

        let fault = DriverError::Rejected {
            code: ErrorCode::Fault,
            message: "cannot enable while faulted".to_string(),
        };
        assert!(matches!(
            RobotError::from_request(fault, timeout),
            RobotError::Fault(_)
        ));

        let oversized = DriverError::Protocol(ProtocolError::TooLong {
            len: 70_000,
            max: 65_507,
        });
        match RobotError::from_request(oversized, timeout) {
            RobotError::InvalidInput(message) => assert!(message.contains("70000")),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_classification() {
        assert!(RobotError::InvalidSession.is_fatal());
        assert!(!RobotError::InvalidSession.is_retryable());

        let busy = RobotError::Rejected {
            code: ErrorCode::Busy,
            message: "plan running".to_string(),
        };
        assert!(busy.is_retryable());
        assert!(!busy.is_fatal());
        assert!(RobotError::Timeout { timeout_ms: 10 }.is_retryable());
    }

    #[test]
    fn test_invalid_mode_display() {
        let err = RobotError::InvalidMode {
            operation: "StreamJointTorque".to_string(),
            required: &[Mode::RtJointTorque],
            current: Mode::NrtJointPosition,
        };
        let text = err.to_string();
        assert!(text.contains("RtJointTorque"));
        assert!(text.contains("NRT_JOINT_POSITION"));
    }
}
