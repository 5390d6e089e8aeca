//! Robot API 模块
//!
//! 提供对外的 `RobotDriver` 结构体，封装握手、RX 线程和请求/应答细节。

use crate::builder::DriverConfig;
use crate::error::DriverError;
use crate::liveness::FeedbackSource;
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::pipeline::{NO_PENDING, Reply, RxShared, SharedTx, rx_loop};
use crate::state::{RobotContext, RobotStateSnapshot};
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use rdk_protocol::{
    Message, Mode, PROTOCOL_VERSION, ProtocolError, ProtocolVersion, Request, SEQ_MASK,
    decode_message, encode_connect, encode_disconnect, encode_request,
};
use rdk_transport::{SplittableTransport, Transport, TransportError, TxTransport};
use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 握手期间 Connect 的重发间隔
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // Watchdog thread joins the target thread
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 检查控制器协议版本（主版本必须一致）
fn check_version(controller: ProtocolVersion) -> Result<(), DriverError> {
    let requirement = VersionReq {
        comparators: vec![Comparator {
            op: Op::Caret,
            major: u64::from(PROTOCOL_VERSION.major),
            minor: None,
            patch: None,
            pre: Prerelease::EMPTY,
        }],
    };
    let theirs = Version::new(
        u64::from(controller.major),
        u64::from(controller.minor),
        u64::from(controller.patch),
    );
    if requirement.matches(&theirs) {
        Ok(())
    } else {
        Err(DriverError::IncompatibleVersion {
            client: PROTOCOL_VERSION.to_string(),
            controller: controller.to_string(),
        })
    }
}

/// 握手：发送 Connect，等待匹配的 ConnectAck
fn handshake<T: Transport>(
    transport: &mut T,
    client_id: u32,
    timeout: Duration,
) -> Result<(ProtocolVersion, u8), DriverError> {
    let connect = encode_connect(client_id, PROTOCOL_VERSION, 0)?;
    transport.send(&connect)?;

    let deadline = Instant::now() + timeout;
    let mut last_send = Instant::now();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DriverError::Timeout);
        }

        match transport.receive_timeout(remaining.min(CONNECT_RETRY_INTERVAL)) {
            Ok(datagram) => match decode_message(&datagram) {
                Ok((
                    _,
                    Message::ConnectAck {
                        client_id: acked_id,
                        status,
                        version,
                        dof,
                    },
                )) if acked_id == client_id => {
                    if !status.is_ok() {
                        return Err(DriverError::Rejected {
                            code: status,
                            message: "connection rejected by controller".to_string(),
                        });
                    }
                    check_version(version)?;
                    return Ok((version, dof));
                },
                Ok((_, other)) => {
                    trace!("Ignoring {:?} during handshake", other.msg_type());
                },
                Err(e) => {
                    debug!("Ignoring invalid datagram during handshake: {}", e);
                },
            },
            Err(TransportError::Timeout) => {
                if last_send.elapsed() >= CONNECT_RETRY_INTERVAL {
                    debug!("No ConnectAck yet, resending Connect");
                    transport.send(&connect)?;
                    last_send = Instant::now();
                }
            },
            Err(e) => return Err(e.into()),
        }
    }
}

/// RDK 控制器驱动（对外 API）
///
/// - 一个 RX 线程负责解码数据报、发布状态快照、转交应答
/// - 请求由 `request_lock` 串行化，整个请求/应答过程持锁
/// - TX 半边单独加锁，只在发送期间持有，流式指令不会等待应答
pub struct RobotDriver {
    ctx: Arc<RobotContext>,
    tx: SharedTx,
    request_lock: Mutex<()>,
    replies: Receiver<Reply>,
    pending_seq: Arc<AtomicU32>,
    seq_counter: AtomicU32,
    client_id: u32,
    controller_version: ProtocolVersion,
    dof: u8,
    rx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    closed: AtomicBool,
    metrics: Arc<DriverMetrics>,
    config: DriverConfig,
}

impl RobotDriver {
    /// 通过给定传输连接控制器
    ///
    /// # 错误
    /// - `DriverError::Transport`: 控制器不可达
    /// - `DriverError::Timeout`: `connect_timeout` 内未收到 ConnectAck
    /// - `DriverError::Rejected`: 控制器拒绝连接
    /// - `DriverError::IncompatibleVersion`: 协议主版本不一致
    pub fn connect<T>(mut transport: T, config: DriverConfig) -> Result<Self, DriverError>
    where
        T: SplittableTransport + Send + 'static,
    {
        let client_id = rand::random::<u32>() | 1;
        let (controller_version, dof) =
            handshake(&mut transport, client_id, config.connect_timeout)?;

        info!(
            "Connected to controller (protocol v{}, {} DOF, client {:#010x})",
            controller_version, dof, client_id
        );

        transport.set_receive_timeout(Duration::from_millis(
            config.pipeline.receive_timeout_ms.max(1),
        ));
        let (rx, tx) = transport.split()?;
        let tx: SharedTx = Arc::new(Mutex::new(Box::new(tx) as Box<dyn TxTransport>));

        let ctx = Arc::new(RobotContext::new(config.connection_timeout));
        ctx.monitor.record(FeedbackSource::Handshake);

        let (reply_tx, replies) =
            crossbeam_channel::bounded(config.pipeline.reply_channel_capacity.max(1));
        let pending_seq = Arc::new(AtomicU32::new(NO_PENDING));
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(DriverMetrics::new());

        let shared = RxShared {
            ctx: ctx.clone(),
            replies: reply_tx,
            pending_seq: pending_seq.clone(),
            tx: tx.clone(),
            client_id,
            metrics: metrics.clone(),
        };
        let is_running_rx = is_running.clone();
        let pipeline = config.pipeline.clone();
        let rx_thread = std::thread::Builder::new()
            .name("rdk-rx".to_string())
            .spawn(move || rx_loop(rx, shared, pipeline, is_running_rx))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        Ok(Self {
            ctx,
            tx,
            request_lock: Mutex::new(()),
            replies,
            pending_seq,
            seq_counter: AtomicU32::new(0),
            client_id,
            controller_version,
            dof,
            rx_thread: Some(rx_thread),
            is_running,
            closed: AtomicBool::new(false),
            metrics,
            config,
        })
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::NotConnected);
        }
        Ok(())
    }

    /// 下一个序列号（24 位，跳过 0）
    fn next_seq(&self) -> u32 {
        loop {
            let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1) & SEQ_MASK;
            if seq != 0 {
                return seq;
            }
        }
    }

    fn send_datagram(&self, datagram: &[u8]) -> Result<(), DriverError> {
        let result = self.tx.lock().send(datagram);
        if result.is_err() {
            self.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
        }
        Ok(result?)
    }

    /// 发送并等待同序列号的应答（调用方持有 `request_lock`）
    fn exchange(&self, seq: u32, datagram: &[u8], timeout: Duration) -> Result<Message, DriverError> {
        // 清理上一次请求超时后才到达的应答
        while self.replies.try_recv().is_ok() {
            self.metrics.rx_stale_replies.fetch_add(1, Ordering::Relaxed);
        }

        self.pending_seq.store(seq, Ordering::Release);
        let result = self
            .send_datagram(datagram)
            .and_then(|()| self.await_reply(seq, timeout));
        self.pending_seq.store(NO_PENDING, Ordering::Release);
        result
    }

    fn await_reply(&self, seq: u32, timeout: Duration) -> Result<Message, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.seq == seq => return Ok(reply.message),
                Ok(reply) => {
                    self.metrics.rx_stale_replies.fetch_add(1, Ordering::Relaxed);
                    trace!("Dropping stale reply seq={}", reply.seq);
                },
                Err(RecvTimeoutError::Timeout) => {
                    self.metrics.request_timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(DriverError::Timeout);
                },
                Err(RecvTimeoutError::Disconnected) => return Err(DriverError::ChannelClosed),
            }
        }
    }

    /// 发送离散请求并等待应答
    ///
    /// 返回 `Ok` 应答的负载（按操作码定义）。流式请求转交给 [`stream`](Self::stream)，
    /// 返回空负载。
    ///
    /// # 错误
    /// - `DriverError::NotConnected`: 已断开
    /// - `DriverError::Timeout`: `request_timeout` 内未收到应答
    /// - `DriverError::Rejected`: 控制器返回非 `Ok` 状态码
    pub fn request(&self, request: &Request) -> Result<Bytes, DriverError> {
        if request.is_streaming() {
            self.stream(request)?;
            return Ok(Bytes::new());
        }

        self.ensure_open()?;
        let _guard = self.request_lock.lock();
        self.ensure_open()?;

        let seq = self.next_seq();
        let datagram = encode_request(request, seq)?;
        self.metrics.tx_requests.fetch_add(1, Ordering::Relaxed);
        trace!("Request {:?} seq={}", request.opcode(), seq);

        match self.exchange(seq, &datagram, self.config.request_timeout)? {
            Message::Response { status, payload } if status.is_ok() => Ok(payload),
            Message::Response { status, payload } => Err(DriverError::Rejected {
                code: status,
                message: String::from_utf8_lossy(&payload).into_owned(),
            }),
            Message::Error { code, message } => Err(DriverError::Rejected { code, message }),
            other => Err(DriverError::Protocol(ProtocolError::Malformed(format!(
                "unexpected reply {:?} to {:?}",
                other.msg_type(),
                request.opcode()
            )))),
        }
    }

    /// 发送流式指令（即发即忘，不等待应答）
    pub fn stream(&self, request: &Request) -> Result<(), DriverError> {
        self.ensure_open()?;
        if !request.is_streaming() {
            return Err(DriverError::Protocol(ProtocolError::Malformed(format!(
                "{:?} is not a stream command",
                request.opcode()
            ))));
        }
        let datagram = encode_request(request, self.next_seq())?;
        self.send_datagram(&datagram)?;
        self.metrics.tx_streams.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 断开连接（幂等）
    ///
    /// 发送 Disconnect 并等待确认（最多 `disconnect_timeout`，未确认只记录警告），
    /// 然后停止 RX 线程。之后所有请求返回 `DriverError::NotConnected`。
    pub fn disconnect(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let _guard = self.request_lock.lock();
            let seq = self.next_seq();
            let result = encode_disconnect(self.client_id, seq)
                .map_err(DriverError::from)
                .and_then(|datagram| {
                    self.exchange(seq, &datagram, self.config.disconnect_timeout)
                });
            match result {
                Ok(Message::DisconnectAck) => debug!("Controller acknowledged disconnect"),
                Ok(other) => debug!("Unexpected reply to disconnect: {:?}", other.msg_type()),
                Err(e) => warn!("Controller did not acknowledge disconnect: {}", e),
            }
        }

        self.stop_rx_thread();
        info!("Disconnected from controller (client {:#010x})", self.client_id);
    }

    fn stop_rx_thread(&mut self) {
        // Release 确保之前的写入对 RX 线程可见
        self.is_running.store(false, Ordering::Release);

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.rx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }

    /// 是否已调用 `disconnect`
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 会话打开、RX 线程存活且在 `connection_timeout` 内收到过控制器数据
    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.is_healthy() && self.ctx.monitor.is_reachable()
    }

    /// RX 线程是否存活
    pub fn is_healthy(&self) -> bool {
        self.rx_thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 获取最新状态快照（无锁，不阻塞）
    pub fn snapshot(&self) -> RobotStateSnapshot {
        **self.ctx.snapshot.load()
    }

    /// 等待接收到第一个状态推送帧
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时未收到状态
    pub fn wait_for_first_state(&self, timeout: Duration) -> Result<RobotStateSnapshot, DriverError> {
        let start = Instant::now();
        loop {
            let snapshot = self.snapshot();
            if snapshot.is_valid() {
                return Ok(snapshot);
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn context(&self) -> &Arc<RobotContext> {
        &self.ctx
    }

    /// 本地镜像的控制模式
    pub fn mode(&self) -> Mode {
        self.ctx.mode.get(Ordering::Acquire)
    }

    /// 更新本地镜像的控制模式（`SetMode`/`GetMode` 成功后调用）
    pub fn set_local_mode(&self, mode: Mode) {
        self.ctx.mode.set(mode, Ordering::Release);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn controller_version(&self) -> ProtocolVersion {
        self.controller_version
    }

    /// 控制器报告的自由度
    pub fn dof(&self) -> u8 {
        self.dof
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

impl Drop for RobotDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdk_protocol::{ErrorCode, StatusFlags};
    use rdk_transport::{MockConfig, MockController};

    fn fast_config() -> DriverConfig {
        DriverConfig {
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_millis(300),
            disconnect_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[test]
    fn test_check_version() {
        assert!(check_version(PROTOCOL_VERSION).is_ok());
        assert!(check_version(ProtocolVersion::new(PROTOCOL_VERSION.major, 9, 9)).is_ok());
        assert!(matches!(
            check_version(ProtocolVersion::new(PROTOCOL_VERSION.major + 1, 0, 0)),
            Err(DriverError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_connect_and_request() {
        let (controller, transport) = MockController::spawn(MockConfig::default());
        let driver = RobotDriver::connect(transport, fast_config()).unwrap();
        assert_eq!(driver.dof(), 7);
        assert!(driver.is_connected());

        let payload = driver.request(&Request::GetStatus).unwrap();
        let status = StatusFlags::from_byte(payload[0]);
        assert!(!status.fault());
        assert_eq!(controller.counters().status_polls, 1);
    }

    #[test]
    fn test_rejected_connect() {
        let (_controller, transport) = MockController::spawn(MockConfig {
            reject_connect: true,
            ..Default::default()
        });
        let err = RobotDriver::connect(transport, fast_config()).err().unwrap();
        assert_eq!(err.error_code(), Some(ErrorCode::Rejected));
    }

    #[test]
    fn test_incompatible_controller() {
        let (_controller, transport) = MockController::spawn(MockConfig {
            version: ProtocolVersion::new(PROTOCOL_VERSION.major + 1, 0, 0),
            ..Default::default()
        });
        let result = RobotDriver::connect(transport, fast_config());
        assert!(matches!(result, Err(DriverError::IncompatibleVersion { .. })));
    }

    #[test]
    fn test_silent_controller_times_out() {
        let (_controller, transport) = MockController::spawn(MockConfig {
            silent: true,
            ..Default::default()
        });
        let result = RobotDriver::connect(transport, fast_config());
        assert!(matches!(result, Err(DriverError::Timeout)));
    }

    #[test]
    fn test_rejected_request_carries_text() {
        let (_controller, transport) = MockController::spawn(MockConfig::default());
        let driver = RobotDriver::connect(transport, fast_config()).unwrap();
        let err = driver.request(&Request::SwitchTcp(99)).unwrap_err();
        match err {
            DriverError::Rejected { code, message } => {
                assert_eq!(code, ErrorCode::NotFound);
                assert!(message.contains("99"));
            },
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_request_timeout_then_recovers() {
        let (controller, transport) = MockController::spawn(MockConfig::default());
        let driver = RobotDriver::connect(transport, fast_config()).unwrap();

        controller.set_silent(true);
        assert!(matches!(
            driver.request(&Request::GetStatus),
            Err(DriverError::Timeout)
        ));

        controller.set_silent(false);
        assert!(driver.request(&Request::GetStatus).is_ok());
        assert_eq!(driver.get_metrics().request_timeouts, 1);
    }

    #[test]
    fn test_state_feed_published() {
        let (_controller, transport) = MockController::spawn(MockConfig::default());
        let driver = RobotDriver::connect(transport, fast_config()).unwrap();
        assert_eq!(driver.snapshot().cycle, 0);

        let snapshot = driver.wait_for_first_state(Duration::from_secs(1)).unwrap();
        assert!(snapshot.cycle > 0);
        assert!(snapshot.received_at.is_some());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (controller, transport) = MockController::spawn(MockConfig::default());
        let mut driver = RobotDriver::connect(transport, fast_config()).unwrap();

        driver.disconnect();
        driver.disconnect();
        assert!(driver.is_closed());
        assert!(!driver.is_connected());
        assert!(matches!(
            driver.request(&Request::GetStatus),
            Err(DriverError::NotConnected)
        ));
        assert_eq!(controller.counters().disconnects, 1);
        assert!(!controller.is_client_connected());
    }

    #[test]
    fn test_drop_releases_session() {
        let (controller, transport) = MockController::spawn(MockConfig::default());
        {
            let _driver = RobotDriver::connect(transport, fast_config()).unwrap();
            assert!(controller.is_client_connected());
        }
        assert!(!controller.is_client_connected());
    }
}
