//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use rdk_sdk::prelude::*;
//! ```

// 客户端层（推荐使用）
pub use rdk_client::control::{LoopConfig, LoopStats, run_stream_loop};
pub use rdk_client::readiness::{Clock, ReadinessConfig, ReadinessState, SystemClock};
pub use rdk_client::types::*;
pub use rdk_client::{Observer, RecoveryOutcome, RobotSession, SessionConfig};

// 驱动层（高级用户使用）
pub use rdk_driver::{DriverBuilder, RobotDriver as Driver};

// 错误类型
pub use rdk_driver::DriverError;
pub use rdk_protocol::ProtocolError;
pub use rdk_transport::TransportError;
