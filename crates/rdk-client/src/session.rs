//! 机器人会话
//!
//! [`RobotSession`] 独占一条到控制器的连接。`disconnect` 显式释放；
//! 调用方没有断开时由 `Drop` 释放。断开后所有指令返回
//! [`RobotError::InvalidSession`]，状态查询返回 `false`。
//!
//! # 示例
//!
//! ```no_run
//! use rdk_client::RobotSession;
//! use rdk_client::readiness::SystemClock;
//!
//! # fn main() -> rdk_client::Result<()> {
//! let mut session = RobotSession::connect("192.168.2.100", "192.168.2.35")?;
//! session.enable_and_wait(&SystemClock::new(), None)?;
//! println!("{:?}", session.get_state().states.q);
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

use crate::config::SessionConfig;
use crate::observer::Observer;
use crate::readiness::{Clock, ReadinessMonitor, ReadinessState};
use crate::recovery::{FaultControl, RecoveryOutcome, recover_from_fault};
use crate::types::{Result, RobotError};
use bytes::{Buf, Bytes};
use rdk_driver::{DriverBuilder, DriverError, MetricsSnapshot, RobotDriver, RobotStateSnapshot};
use rdk_protocol::codec::get_u8;
use rdk_protocol::{Mode, ProtocolError, ProtocolVersion, Request, RobotInfo, StatusFlags};
use rdk_transport::SplittableTransport;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 解码应答负载，要求恰好用完
pub(crate) fn decode_payload<T>(
    payload: Bytes,
    decode: impl FnOnce(&mut Bytes) -> std::result::Result<T, ProtocolError>,
) -> Result<T> {
    let mut buf = payload;
    let value = decode(&mut buf).map_err(|e| RobotError::Driver(DriverError::Protocol(e)))?;
    if buf.has_remaining() {
        return Err(RobotError::Driver(DriverError::Protocol(
            ProtocolError::Malformed(format!("{} trailing bytes in response", buf.remaining())),
        )));
    }
    Ok(value)
}

/// 机器人会话（独占所有权，不可克隆）
pub struct RobotSession {
    driver: Option<RobotDriver>,
    observer: Observer,
    config: SessionConfig,
    robot_address: String,
}

impl RobotSession {
    /// 使用默认配置连接控制器
    ///
    /// # 错误
    /// - `RobotError::Connection`: 控制器不可达、拒绝连接或协议版本不兼容
    pub fn connect(robot_address: &str, local_address: &str) -> Result<Self> {
        Self::connect_with_config(robot_address, local_address, SessionConfig::default())
    }

    pub fn connect_with_config(
        robot_address: &str,
        local_address: &str,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Connecting to controller at {} (local {})",
            robot_address, local_address
        );
        let driver = DriverBuilder::new(robot_address)
            .local_address(local_address)
            .config(config.driver_config())
            .build()
            .map_err(RobotError::Connection)?;
        Ok(Self::from_driver(driver, config, robot_address.to_string()))
    }

    /// 通过自定义传输连接（模拟控制器或其他链路）
    pub fn connect_with_transport<T>(transport: T, config: SessionConfig) -> Result<Self>
    where
        T: SplittableTransport + Send + 'static,
    {
        config.validate()?;
        let driver = RobotDriver::connect(transport, config.driver_config())
            .map_err(RobotError::Connection)?;
        Ok(Self::from_driver(driver, config, "custom transport".to_string()))
    }

    fn from_driver(driver: RobotDriver, config: SessionConfig, robot_address: String) -> Self {
        let observer = Observer::new(driver.context().clone());
        let session = Self {
            driver: Some(driver),
            observer,
            config,
            robot_address,
        };
        // 同步本地模式镜像
        if let Err(e) = session.get_mode() {
            warn!("Failed to read initial mode: {}", e);
        }
        session
    }

    pub(crate) fn driver(&self) -> Result<&RobotDriver> {
        self.driver.as_ref().ok_or(RobotError::InvalidSession)
    }

    /// 发送离散请求，返回应答负载
    pub(crate) fn request(&self, request: &Request) -> Result<Bytes> {
        let driver = self.driver()?;
        driver
            .request(request)
            .map_err(|e| RobotError::from_request(e, self.config.request_timeout()))
    }

    /// 发送流式指令
    pub(crate) fn stream(&self, request: &Request) -> Result<()> {
        let driver = self.driver()?;
        driver
            .stream(request)
            .map_err(|e| RobotError::from_request(e, self.config.request_timeout()))
    }

    /// 检查本地镜像的模式是否允许此请求（不发送任何数据）
    pub(crate) fn ensure_mode(&self, request: &Request) -> Result<()> {
        let current = self.driver()?.mode();
        if request.allowed_in(current) {
            return Ok(());
        }
        Err(RobotError::InvalidMode {
            operation: format!("{:?}", request.opcode()),
            required: request.required_modes(),
            current,
        })
    }

    // ==================== 状态查询 ====================

    /// 查询控制器状态位（实时往返，不缓存）
    ///
    /// 往返失败时记录警告并返回最近一次状态推送帧的状态位；
    /// 会话断开后返回全 `false`。
    pub fn status_flags(&self) -> StatusFlags {
        let Some(driver) = self.driver.as_ref() else {
            return StatusFlags::from_byte(0);
        };
        match self
            .request(&Request::GetStatus)
            .and_then(|payload| decode_payload(payload, get_u8))
        {
            Ok(byte) => StatusFlags::from_byte(byte),
            Err(e) => {
                warn!("Status query failed ({}), using latest state feed", e);
                driver.snapshot().status
            },
        }
    }

    /// 会话打开且控制器在 `connection_timeout` 内有响应
    pub fn is_connected(&self) -> bool {
        let Some(driver) = self.driver.as_ref() else {
            return false;
        };
        match self.request(&Request::GetStatus) {
            Ok(_) => true,
            Err(e) => {
                debug!("Status round trip failed: {}", e);
                driver.is_connected()
            },
        }
    }

    pub fn is_operational(&self) -> bool {
        self.status_flags().operational()
    }

    pub fn is_busy(&self) -> bool {
        self.status_flags().busy()
    }

    pub fn is_fault(&self) -> bool {
        self.status_flags().fault()
    }

    pub fn is_estop_released(&self) -> bool {
        self.status_flags().estop_released()
    }

    pub fn is_recovery_state(&self) -> bool {
        self.status_flags().recovery_state()
    }

    pub fn is_stopped(&self) -> bool {
        self.status_flags().stopped()
    }

    // ==================== 生命周期 ====================

    /// 请求使能
    ///
    /// 异步：返回 `Ok` 只表示控制器接受了请求，需要之后轮询 `is_operational`
    /// （见 [`enable_and_wait`](Self::enable_and_wait)）。
    pub fn enable(&self) -> Result<()> {
        self.request(&Request::Enable)?;
        info!("Enable requested");
        Ok(())
    }

    /// 使能并等待就绪
    ///
    /// # 错误
    /// - `RobotError::Timeout`: `max_polls` 次轮询后仍未就绪
    /// - `RobotError::Cancelled`: 取消标志被置位
    pub fn enable_and_wait(&self, clock: &dyn Clock, cancel: Option<&AtomicBool>) -> Result<()> {
        self.enable()?;

        let readiness = self.config.readiness_config();
        let mut monitor = ReadinessMonitor::new(readiness, clock);
        if let Some(cancel) = cancel {
            monitor = monitor.with_cancel_flag(cancel);
        }

        match monitor.run(|| self.is_operational()) {
            ReadinessState::Operational => Ok(()),
            ReadinessState::Cancelled => Err(RobotError::Cancelled),
            ReadinessState::TimedOut | ReadinessState::Enabling => Err(RobotError::Timeout {
                timeout_ms: readiness.max_wait().as_millis() as u64,
            }),
        }
    }

    /// 停止运动并回到空闲模式
    pub fn stop(&self) -> Result<()> {
        self.request(&Request::Stop)?;
        self.driver()?.set_local_mode(Mode::Idle);
        info!("Robot stopped");
        Ok(())
    }

    /// 请求清除故障（成功与否需要重新查询 `is_fault`）
    pub fn clear_fault(&self) -> Result<()> {
        self.request(&Request::ClearFault)?;
        info!("Fault clear requested");
        Ok(())
    }

    /// 故障时清除并复查
    pub fn recover_fault(&self, clock: &dyn Clock) -> Result<RecoveryOutcome> {
        recover_from_fault(self, clock, self.config.readiness_config().fault_clear_wait)
    }

    /// 启动自动恢复
    pub fn start_auto_recovery(&self) -> Result<()> {
        self.request(&Request::StartAutoRecovery)?;
        info!("Auto recovery started");
        Ok(())
    }

    /// 查询机器人静态信息
    pub fn info(&self) -> Result<RobotInfo> {
        let payload = self.request(&Request::GetRobotInfo)?;
        decode_payload(payload, |buf| RobotInfo::decode(buf))
    }

    /// 断开会话（幂等）
    pub fn disconnect(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.disconnect();
            info!("Session with {} closed", self.robot_address);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.driver.is_none()
    }

    // ==================== 状态读取 ====================

    /// 最新状态快照（无锁，不阻塞，断开后返回最后一个快照）
    pub fn get_state(&self) -> RobotStateSnapshot {
        self.observer.get_state()
    }

    /// 等待第一个状态推送帧
    pub fn wait_for_first_state(&self, timeout: Duration) -> Result<RobotStateSnapshot> {
        self.driver()?
            .wait_for_first_state(timeout)
            .map_err(|e| RobotError::from_request(e, timeout))
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn robot_address(&self) -> &str {
        &self.robot_address
    }

    pub fn controller_version(&self) -> Result<ProtocolVersion> {
        Ok(self.driver()?.controller_version())
    }

    pub fn metrics(&self) -> Result<MetricsSnapshot> {
        Ok(self.driver()?.get_metrics())
    }
}

impl FaultControl for RobotSession {
    fn is_fault(&self) -> bool {
        RobotSession::is_fault(self)
    }

    fn clear_fault(&self) -> Result<()> {
        RobotSession::clear_fault(self)
    }
}

impl Drop for RobotSession {
    fn drop(&mut self) {
        if self.driver.is_some() {
            debug!("Session dropped without disconnect, releasing");
            self.disconnect();
        }
    }
}
