//! 驱动层模块
//!
//! 本模块提供 RDK 控制器的设备驱动功能，包括：
//! - 握手（Connect/ConnectAck，协议主版本兼容性检查）
//! - IO 线程管理（RX 线程解码数据报）
//! - 状态同步（ArcSwap 无锁读取，整帧发布，不会出现撕裂）
//! - 请求/应答（按 24 位序列号匹配，请求互斥串行化）
//! - 流式指令（即发即忘，不等待应答）
//!
//! # 使用场景
//!
//! 适用于需要直接收发协议请求的场景。
//! 大多数用户应该使用 `rdk-client` 提供的 `RobotSession`。

mod builder;
mod error;
pub mod liveness;
pub mod metrics;
pub mod mode;
pub mod pipeline;
mod robot;
pub mod state;

pub use builder::{DriverBuilder, DriverConfig};
pub use error::DriverError;
pub use liveness::{FeedbackSource, Liveness, LivenessMonitor};
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use mode::AtomicMode;
pub use pipeline::{PipelineConfig, Reply, rx_loop};
pub use robot::RobotDriver;
pub use state::*;
