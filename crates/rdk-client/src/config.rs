//! 会话配置
//!
//! 所有时长以毫秒整数表示，便于写在 TOML 中：
//!
//! ```toml
//! connect_timeout_ms = 3000
//! request_timeout_ms = 1000
//!
//! [readiness]
//! poll_interval_ms = 1000
//! max_polls = 10
//! ```

use crate::readiness::ReadinessConfig;
use crate::types::{Result, RobotError};
use rdk_driver::{DriverConfig, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 会话配置（缺省字段取默认值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 握手超时
    pub connect_timeout_ms: u64,
    /// 单个请求等待应答的超时
    pub request_timeout_ms: u64,
    /// 超过该时长未收到控制器数据视为失联
    pub connection_timeout_ms: u64,
    /// 断开时等待确认的超时
    pub disconnect_timeout_ms: u64,
    /// 心跳间隔，0 表示不发送
    pub heartbeat_interval_ms: u64,
    /// RX 线程接收超时
    pub receive_timeout_ms: u64,
    pub readiness: ReadinessSection,
}

/// `[readiness]` 段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSection {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub fault_clear_wait_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let driver = DriverConfig::default();
        Self {
            connect_timeout_ms: driver.connect_timeout.as_millis() as u64,
            request_timeout_ms: driver.request_timeout.as_millis() as u64,
            connection_timeout_ms: driver.connection_timeout.as_millis() as u64,
            disconnect_timeout_ms: driver.disconnect_timeout.as_millis() as u64,
            heartbeat_interval_ms: driver.pipeline.heartbeat_interval_ms,
            receive_timeout_ms: driver.pipeline.receive_timeout_ms,
            readiness: ReadinessSection::default(),
        }
    }
}

impl Default for ReadinessSection {
    fn default() -> Self {
        let readiness = ReadinessConfig::default();
        Self {
            poll_interval_ms: readiness.poll_interval.as_millis() as u64,
            max_polls: readiness.max_polls,
            fault_clear_wait_ms: readiness.fault_clear_wait.as_millis() as u64,
        }
    }
}

impl SessionConfig {
    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RobotError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RobotError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(RobotError::ConfigError(
                "connect_timeout_ms and request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.readiness.poll_interval_ms == 0 || self.readiness.max_polls == 0 {
            return Err(RobotError::ConfigError(
                "readiness.poll_interval_ms and readiness.max_polls must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            disconnect_timeout: Duration::from_millis(self.disconnect_timeout_ms),
            pipeline: PipelineConfig {
                receive_timeout_ms: self.receive_timeout_ms,
                heartbeat_interval_ms: self.heartbeat_interval_ms,
                ..PipelineConfig::default()
            },
        }
    }

    pub fn readiness_config(&self) -> ReadinessConfig {
        ReadinessConfig {
            poll_interval: Duration::from_millis(self.readiness.poll_interval_ms),
            max_polls: self.readiness.max_polls,
            fault_clear_wait: Duration::from_millis(self.readiness.fault_clear_wait_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}
