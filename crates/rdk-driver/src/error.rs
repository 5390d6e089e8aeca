//! 驱动层错误类型定义

use rdk_protocol::{ErrorCode, ProtocolError};
use rdk_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 应答通道已关闭（IO 线程退出）
    #[error("Reply channel closed")]
    ChannelClosed,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 控制器拒绝请求
    #[error("Controller rejected request ({code}): {message}")]
    Rejected { code: ErrorCode, message: String },

    /// 控制器协议主版本不兼容
    #[error("Incompatible controller protocol version {controller} (client speaks {client})")]
    IncompatibleVersion { client: String, controller: String },

    /// 会话已关闭
    #[error("Not connected")]
    NotConnected,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 控制器返回的状态码（仅 `Rejected`）
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            DriverError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::Transport(TransportError::Timeout);
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Read timeout"), "Transport error message: {}", msg);

        let driver_error = DriverError::Protocol(ProtocolError::InvalidLength {
            expected: 8,
            actual: 4,
        });
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Invalid message length"), "Protocol error message: {}", msg);

        assert_eq!(format!("{}", DriverError::ChannelClosed), "Reply channel closed");
        assert_eq!(format!("{}", DriverError::Timeout), "Operation timeout");

        let driver_error = DriverError::Rejected {
            code: ErrorCode::InvalidMode,
            message: "wrong mode".to_string(),
        };
        let msg = format!("{}", driver_error);
        assert!(msg.contains("invalid mode") && msg.contains("wrong mode"));
    }

    #[test]
    fn test_from_transport_error() {
        let driver_error: DriverError = TransportError::Closed.into();
        assert!(matches!(driver_error, DriverError::Transport(TransportError::Closed)));
    }

    #[test]
    fn test_error_code() {
        let err = DriverError::Rejected {
            code: ErrorCode::Busy,
            message: String::new(),
        };
        assert_eq!(err.error_code(), Some(ErrorCode::Busy));
        assert_eq!(DriverError::Timeout.error_code(), None);
    }
}
