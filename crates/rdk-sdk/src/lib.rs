//! RDK SDK - 机器人控制器 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): UDP 线协议编码/解码
//! - **传输层** (`transport`): 数据报传输抽象与 UDP 实现
//! - **驱动层** (`driver`): IO 线程、状态同步、请求/应答
//! - **客户端层** (`client`): 会话、指令、任务、就绪轮询
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use rdk_sdk::prelude::*;
//!
//! # fn main() -> rdk_sdk::client::Result<()> {
//! rdk_sdk::init_logger();
//! let mut session = RobotSession::connect("192.168.2.100", "192.168.2.35")?;
//! session.enable_and_wait(&SystemClock::new(), None)?;
//! println!("q = {:?}", session.get_state().states.q);
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

mod logging;
pub mod prelude;

pub use rdk_client as client;
pub use rdk_driver as driver;
pub use rdk_protocol as protocol;
pub use rdk_transport as transport;

pub use logging::{init_logger, init_logger_with_filter};

// 客户端层（普通用户使用）- 这是推荐的入口点
pub use rdk_client::{Observer, RobotError, RobotSession, SessionConfig};

// 驱动层与协议层错误
pub use rdk_driver::DriverError;
pub use rdk_protocol::ProtocolError;
pub use rdk_transport::TransportError;

// 类型别名：为驱动层提供清晰的别名
pub type Driver = rdk_driver::RobotDriver;
