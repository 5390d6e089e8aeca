//! 客户端接口模块
//!
//! 本模块提供 RDK 控制器的会话级接口，包括：
//! - `RobotSession`：独占会话，显式断开，`Drop` 兜底释放
//! - Commander/Observer 读写分离（`Observer` 无锁读取状态快照）
//! - 指令分发（发送前检查控制模式）
//! - 任务与原语执行、全局变量
//! - 使能后的就绪轮询（注入时钟的状态机）与故障恢复
//! - 流式控制循环
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。需要直接收发协议请求时，
//! 可以使用 `rdk-driver` 的 `RobotDriver`。

mod command;
pub mod config;
pub mod control;
pub mod observer;
mod plan;
pub mod readiness;
pub mod recovery;
mod session;
pub mod types;

// 重新导出常用类型
pub use config::SessionConfig;
pub use observer::Observer;
pub use readiness::{Clock, ManualClock, ReadinessConfig, ReadinessMonitor, ReadinessState, SystemClock};
pub use recovery::{FaultControl, RecoveryOutcome, recover_from_fault};
pub use session::RobotSession;
pub use types::*;
