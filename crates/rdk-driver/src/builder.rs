//! Builder 模式实现
//!
//! 提供链式构造 `RobotDriver` 实例的便捷方式。

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::robot::RobotDriver;
use rdk_transport::{SplittableTransport, UdpTransport};
use std::time::Duration;
use tracing::debug;

/// 驱动超时配置
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// 握手超时（等待 ConnectAck）
    pub connect_timeout: Duration,
    /// 单个请求等待应答的超时
    pub request_timeout: Duration,
    /// 超过该时长未收到控制器任何数据视为失联
    pub connection_timeout: Duration,
    /// 断开时等待 DisconnectAck 的超时
    pub disconnect_timeout: Duration,
    /// RX 线程配置
    pub pipeline: PipelineConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(1),
            disconnect_timeout: Duration::from_millis(500),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// RobotDriver Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rdk_driver::DriverBuilder;
/// use std::time::Duration;
///
/// let driver = DriverBuilder::new("192.168.2.100")
///     .local_address("192.168.2.35")
///     .request_timeout(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DriverBuilder {
    /// 控制器地址（未指定端口时使用默认端口）
    robot_address: String,
    /// 本地绑定地址（未指定端口时由系统分配）
    local_address: String,
    config: DriverConfig,
}

impl DriverBuilder {
    pub fn new(robot_address: impl Into<String>) -> Self {
        Self {
            robot_address: robot_address.into(),
            local_address: "0.0.0.0".to_string(),
            config: DriverConfig::default(),
        }
    }

    pub fn local_address(mut self, local_address: impl Into<String>) -> Self {
        self.local_address = local_address.into();
        self
    }

    /// 整体替换配置
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// 设置 Pipeline 配置（可选）
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.config.pipeline = config;
        self
    }

    /// 通过 UDP 连接控制器
    ///
    /// # Errors
    /// - `DriverError::Transport`: 地址无法解析、绑定失败或控制器不可达
    /// - 其余同 [`RobotDriver::connect`]
    pub fn build(self) -> Result<RobotDriver, DriverError> {
        let transport = UdpTransport::connect(&self.robot_address, &self.local_address)?;
        debug!(
            "UDP transport ready: {} -> {}",
            transport
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| self.local_address.clone()),
            transport.robot_addr()
        );
        RobotDriver::connect(transport, self.config)
    }

    /// 使用自定义传输连接（测试或其他链路）
    pub fn build_with_transport<T>(self, transport: T) -> Result<RobotDriver, DriverError>
    where
        T: SplittableTransport + Send + 'static,
    {
        RobotDriver::connect(transport, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdk_transport::{MockConfig, MockController};

    #[test]
    fn test_builder_chain() {
        let builder = DriverBuilder::new("10.0.0.2")
            .local_address("10.0.0.1")
            .request_timeout(Duration::from_millis(250))
            .connection_timeout(Duration::from_millis(750));

        assert_eq!(builder.robot_address, "10.0.0.2");
        assert_eq!(builder.local_address, "10.0.0.1");
        assert_eq!(builder.config.request_timeout, Duration::from_millis(250));
        assert_eq!(builder.config.connection_timeout, Duration::from_millis(750));
        assert_eq!(builder.config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_build_rejects_bad_address() {
        let result = DriverBuilder::new("not an address:::").build();
        assert!(matches!(result, Err(DriverError::Transport(_))));
    }

    #[test]
    fn test_build_with_transport() {
        let (_controller, transport) = MockController::spawn(MockConfig::default());
        let driver = DriverBuilder::new("mock")
            .connect_timeout(Duration::from_millis(500))
            .build_with_transport(transport)
            .unwrap();
        assert_eq!(driver.dof(), 7);
    }

    #[test]
    fn test_build_over_udp() {
        let controller =
            MockController::spawn_udp("127.0.0.1:0", MockConfig::default()).unwrap();
        let robot = controller.local_addr().unwrap().to_string();
        let driver = DriverBuilder::new(robot)
            .local_address("127.0.0.1")
            .connect_timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        assert!(driver.is_connected());
        assert!(driver.wait_for_first_state(Duration::from_secs(1)).is_ok());
    }
}
