//! 控制循环模块
//!
//! - Loop Runner - 以固定频率调用流式指令的循环包装器

pub mod loop_runner;

// 重新导出常用类型
pub use loop_runner::{LoopConfig, LoopStats, run_stream_loop};
