//! 模拟控制器（仅用于测试，无硬件依赖）
//!
//! `MockController` 在后台线程中运行一个简化的控制器状态机：握手、状态位、
//! 模式检查、任务/原语、全局变量、数字 IO，并按 `feed_interval` 周期推送状态帧。
//!
//! 两种接入方式：
//! - [`MockController::spawn`]: 进程内 channel，返回配对的 [`MockTransport`]
//! - [`MockController::spawn_udp`]: 绑定真实 UDP 端口，可被 `UdpTransport` 或 CLI 连接

use crate::{RxTransport, SplittableTransport, Transport, TransportError, TxTransport};
use bytes::{BufMut, Bytes, BytesMut};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rdk_protocol::codec::{put_bool, put_str_list};
use rdk_protocol::{
    ErrorCode, GlobalVariables, JOINT_DOF, JointTorqueTarget, Message, Mode, PROTOCOL_VERSION,
    PlanInfo, PrimitiveStates, ProtocolVersion, Request, RobotInfo, RobotStates, StateFeed,
    StatusFlags, WRENCH_LEN, decode_message, encode_error_response, encode_response,
    encode_state_feed,
};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 模拟控制器的数字 IO 端口数
pub const DIGITAL_PORTS: u8 = 16;
/// 模拟控制器的 TCP 数量
pub const TCP_COUNT: u32 = 4;

/// 模拟控制器配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 使能后第几次 `GetStatus` 报告可操作（`None` 表示永不）
    pub operational_after_polls: Option<u32>,
    /// 启动时处于故障状态
    pub fault: bool,
    /// `ClearFault` 能否清除故障
    pub fault_clearable: bool,
    /// 急停是否已释放
    pub estop_released: bool,
    /// 拒绝连接请求
    pub reject_connect: bool,
    /// 完全不应答（模拟控制器离线）
    pub silent: bool,
    /// 报告的协议版本
    pub version: ProtocolVersion,
    /// 状态推送周期
    pub feed_interval: Duration,
    /// 可执行的任务名称
    pub plans: Vec<String>,
    /// 任务/原语启动后保持忙状态的 `GetStatus` 次数
    pub busy_polls: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            operational_after_polls: Some(1),
            fault: false,
            fault_clearable: true,
            estop_released: true,
            reject_connect: false,
            silent: false,
            version: PROTOCOL_VERSION,
            feed_interval: Duration::from_millis(4),
            plans: vec!["PLAN-Home".to_string(), "PLAN-PickPlace".to_string()],
            busy_polls: 2,
        }
    }
}

/// 模拟控制器计数器（测试断言用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCounters {
    pub connects: u32,
    pub disconnects: u32,
    pub enables: u32,
    pub status_polls: u32,
    pub clear_faults: u32,
    pub requests: u32,
    pub stream_commands: u32,
    pub rejected_streams: u32,
    pub feeds_sent: u64,
}

type Reply = Result<BytesMut, (ErrorCode, String)>;

struct SimState {
    config: MockConfig,
    client_id: Option<u32>,
    mode: Mode,
    enabled: bool,
    polls_since_enable: u32,
    operational: bool,
    fault: bool,
    recovery: bool,
    stopped: bool,
    paused: bool,
    busy_polls_left: u32,
    cycle: u64,
    started: Instant,
    states: RobotStates,
    info: RobotInfo,
    plan_info: PlanInfo,
    primitive: Option<String>,
    global_vars: GlobalVariables,
    tcp_index: u32,
    stiffness: [f64; WRENCH_LEN],
    null_space: [f64; JOINT_DOF],
    digital_outputs: [bool; DIGITAL_PORTS as usize],
    last_torque: Option<JointTorqueTarget>,
    counters: MockCounters,
}

impl SimState {
    fn new(config: MockConfig) -> Self {
        let fault = config.fault;
        Self {
            config,
            client_id: None,
            mode: Mode::Idle,
            enabled: false,
            polls_since_enable: 0,
            operational: false,
            fault,
            recovery: false,
            stopped: false,
            paused: false,
            busy_polls_left: 0,
            cycle: 0,
            started: Instant::now(),
            states: RobotStates::default(),
            info: RobotInfo {
                serial_number: "SIM-0000001".to_string(),
                software_version: "sim-1.0".to_string(),
                dof: JOINT_DOF as u8,
                k_x_nom: [3000.0, 3000.0, 3000.0, 300.0, 300.0, 300.0],
                q_min: [-2.79, -2.23, -2.96, -1.95, -2.96, -1.48, -2.96],
                q_max: [2.79, 2.23, 2.96, 2.68, 2.96, 4.62, 2.96],
                dq_max: [2.0, 2.0, 2.0, 2.0, 2.5, 2.5, 2.5],
                tau_max: [123.0, 123.0, 64.0, 64.0, 39.0, 39.0, 39.0],
            },
            plan_info: PlanInfo::default(),
            primitive: None,
            global_vars: GlobalVariables::new(),
            tcp_index: 0,
            stiffness: [3000.0, 3000.0, 3000.0, 300.0, 300.0, 300.0],
            null_space: [0.0; JOINT_DOF],
            digital_outputs: [false; DIGITAL_PORTS as usize],
            last_torque: None,
            counters: MockCounters::default(),
        }
    }

    fn status(&self) -> StatusFlags {
        let mut flags = StatusFlags::from_byte(0);
        flags.set_operational(self.operational && !self.fault);
        flags.set_busy(self.busy_polls_left > 0 && !self.paused);
        flags.set_fault(self.fault);
        flags.set_estop_released(self.config.estop_released);
        flags.set_recovery_state(self.recovery);
        flags.set_stopped(self.stopped);
        flags
    }

    /// 处理一个数据报，返回需要回发的数据报
    fn handle(&mut self, datagram: &[u8]) -> Option<Bytes> {
        if self.config.silent {
            return None;
        }

        let (header, message) = match decode_message(datagram) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Mock controller received invalid datagram: {}", e);
                return Message::Error {
                    code: ErrorCode::InvalidMessage,
                    message: e.to_string(),
                }
                .encode(0)
                .ok();
            },
        };

        let reply = match message {
            Message::Connect { client_id, version } => {
                self.counters.connects += 1;
                debug!("Mock controller: connect from client {client_id:#x} (v{version})");
                let status = if self.config.reject_connect {
                    ErrorCode::Rejected
                } else {
                    self.client_id = Some(client_id);
                    self.mode = Mode::Idle;
                    ErrorCode::Ok
                };
                Message::ConnectAck {
                    client_id,
                    status,
                    version: self.config.version,
                    dof: JOINT_DOF as u8,
                }
                .encode(header.seq)
            },
            Message::Disconnect { client_id } => {
                self.counters.disconnects += 1;
                debug!("Mock controller: disconnect from client {client_id:#x}");
                self.client_id = None;
                self.enabled = false;
                self.operational = false;
                self.mode = Mode::Idle;
                Message::DisconnectAck.encode(header.seq)
            },
            Message::Heartbeat { .. } => return None,
            Message::Request(request) => {
                self.counters.requests += 1;
                match self.handle_request(&request) {
                    Ok(payload) => encode_response(payload.freeze(), header.seq),
                    Err((code, text)) => {
                        debug!("Mock controller rejected {:?}: {}", request.opcode(), text);
                        encode_error_response(code, &text, header.seq)
                    },
                }
            },
            Message::Stream(request) => {
                self.handle_stream(&request);
                return None;
            },
            other => {
                warn!("Mock controller ignoring {:?}", other.msg_type());
                return None;
            },
        };

        match reply {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Mock controller failed to encode reply: {}", e);
                None
            },
        }
    }

    fn require_operational(&self) -> Result<(), (ErrorCode, String)> {
        if self.fault {
            return Err((ErrorCode::Fault, "robot is faulted".to_string()));
        }
        if !self.operational {
            return Err((ErrorCode::Rejected, "robot is not operational".to_string()));
        }
        Ok(())
    }

    fn handle_request(&mut self, request: &Request) -> Reply {
        if self.client_id.is_none() {
            return Err((ErrorCode::NotConnected, "no client connected".to_string()));
        }

        if !request.allowed_in(self.mode) {
            return Err((
                ErrorCode::InvalidMode,
                format!(
                    "{:?} requires {:?}, current mode is {}",
                    request.opcode(),
                    request.required_modes(),
                    self.mode
                ),
            ));
        }

        let mut payload = BytesMut::new();
        match request {
            Request::Enable => {
                self.counters.enables += 1;
                if self.fault {
                    return Err((ErrorCode::Fault, "cannot enable while faulted".to_string()));
                }
                if !self.config.estop_released {
                    return Err((ErrorCode::Rejected, "E-stop is engaged".to_string()));
                }
                self.enabled = true;
                self.stopped = false;
                self.polls_since_enable = 0;
                self.operational = self.config.operational_after_polls == Some(0);
            },
            Request::Stop => {
                self.mode = Mode::Idle;
                self.busy_polls_left = 0;
                self.primitive = None;
                self.stopped = true;
            },
            Request::ClearFault => {
                self.counters.clear_faults += 1;
                if self.fault && self.config.fault_clearable {
                    self.fault = false;
                }
            },
            Request::StartAutoRecovery => {
                self.recovery = false;
            },
            Request::GetStatus => {
                self.counters.status_polls += 1;
                if self.enabled && !self.operational {
                    self.polls_since_enable += 1;
                    if let Some(n) = self.config.operational_after_polls {
                        self.operational = self.polls_since_enable >= n;
                    }
                }
                payload.put_u8(self.status().to_byte());
                if self.busy_polls_left > 0 && !self.paused {
                    self.busy_polls_left -= 1;
                }
            },
            Request::GetRobotInfo => {
                self.info.encode(&mut payload).map_err(protocol_failure)?;
            },
            Request::SetMode(mode) => {
                self.require_operational()?;
                if *mode == Mode::Unknown {
                    return Err((ErrorCode::Rejected, "invalid target mode".to_string()));
                }
                self.mode = *mode;
                self.stopped = false;
            },
            Request::GetMode => payload.put_u8(self.mode.as_u8()),
            Request::SwitchTcp(index) => {
                if *index >= TCP_COUNT {
                    return Err((ErrorCode::NotFound, format!("TCP {index} does not exist")));
                }
                self.tcp_index = *index;
            },
            Request::ExecutePlan(index) => {
                self.require_operational()?;
                let name = self
                    .config
                    .plans
                    .get(*index as usize)
                    .cloned()
                    .ok_or_else(|| (ErrorCode::NotFound, format!("plan index {index} out of range")))?;
                self.start_plan(name);
            },
            Request::ExecutePlanByName(name) => {
                self.require_operational()?;
                if !self.config.plans.iter().any(|p| p == name) {
                    return Err((ErrorCode::NotFound, format!("plan {name:?} not found")));
                }
                self.start_plan(name.clone());
            },
            Request::PausePlan(pause) => self.paused = *pause,
            Request::GetPlanNameList => {
                put_str_list(&mut payload, &self.config.plans).map_err(protocol_failure)?;
            },
            Request::GetPlanInfo => {
                self.plan_info.encode(&mut payload).map_err(protocol_failure)?;
            },
            Request::ExecutePrimitive(command) => {
                self.require_operational()?;
                let name = command.split('(').next().unwrap_or_default().trim();
                if name.is_empty() {
                    return Err((ErrorCode::Rejected, "empty primitive command".to_string()));
                }
                self.primitive = Some(name.to_string());
                self.busy_polls_left = self.config.busy_polls;
            },
            Request::GetPrimitiveStates => {
                let states = match &self.primitive {
                    Some(name) => {
                        let done = u8::from(self.busy_polls_left == 0);
                        PrimitiveStates::new(vec![
                            format!("primitiveName: {name}"),
                            format!("reachedTarget: {done}"),
                            format!("terminated: {done}"),
                        ])
                    },
                    None => PrimitiveStates::default(),
                };
                states.encode(&mut payload).map_err(protocol_failure)?;
            },
            Request::SetGlobalVariables(vars) => self.global_vars.merge(vars),
            Request::GetGlobalVariables => {
                self.global_vars.encode(&mut payload).map_err(protocol_failure)?;
            },
            Request::SendJointPosition(target) => {
                self.require_operational()?;
                for (i, position) in target.positions.iter().enumerate() {
                    if !self.info.check_joint_position(i, *position) {
                        return Err((
                            ErrorCode::Rejected,
                            format!("joint {i} target {position} out of range"),
                        ));
                    }
                }
                self.states.q = target.positions;
                self.states.theta = target.positions;
                self.states.dq = [0.0; JOINT_DOF];
            },
            Request::SendCartesianMotionForce(target) => {
                self.require_operational()?;
                self.states.tcp_pose = target.pose;
                self.states.tcp_pose_des = target.pose;
                self.states.ext_wrench_in_tcp = target.wrench;
            },
            Request::SetCartesianStiffness(stiffness) => self.stiffness = *stiffness,
            Request::SetNullSpacePosture(posture) => self.null_space = *posture,
            Request::WriteDigitalOutput { port, value } => {
                if *port >= DIGITAL_PORTS {
                    return Err((ErrorCode::NotFound, format!("digital port {port} does not exist")));
                }
                self.digital_outputs[*port as usize] = *value;
            },
            Request::ReadDigitalInput(port) => {
                if *port >= DIGITAL_PORTS {
                    return Err((ErrorCode::NotFound, format!("digital port {port} does not exist")));
                }
                // 输入与输出回环连接
                put_bool(&mut payload, self.digital_outputs[*port as usize]);
            },
            Request::StreamJointTorque(_)
            | Request::StreamJointPosition(_)
            | Request::StreamCartesianMotionForce(_) => {
                return Err((ErrorCode::InvalidMessage, "stream command sent as request".to_string()));
            },
        }
        Ok(payload)
    }

    fn handle_stream(&mut self, request: &Request) {
        self.counters.stream_commands += 1;
        if self.client_id.is_none()
            || !self.operational
            || self.fault
            || !request.allowed_in(self.mode)
        {
            self.counters.rejected_streams += 1;
            trace!("Mock controller dropped stream command {:?}", request.opcode());
            return;
        }

        match request {
            Request::StreamJointTorque(target) => {
                self.states.tau_des = target.torques;
                self.last_torque = Some(*target);
            },
            Request::StreamJointPosition(target) => {
                self.states.q = target.positions;
                self.states.theta = target.positions;
                self.states.dq = target.velocities;
            },
            Request::StreamCartesianMotionForce(target) => {
                self.states.tcp_pose = target.pose;
                self.states.tcp_pose_des = target.pose;
            },
            _ => {},
        }
    }

    fn start_plan(&mut self, name: String) {
        self.plan_info = PlanInfo {
            pt_name: "MoveJ".to_string(),
            node_name: "Start".to_string(),
            node_path: "rootNode::Start".to_string(),
            node_path_time_period: "0".to_string(),
            node_path_number: "0".to_string(),
            assigned_plan_name: name,
            velocity_scale: 100,
        };
        self.paused = false;
        self.busy_polls_left = self.config.busy_polls;
    }

    fn next_feed(&mut self) -> Option<Bytes> {
        if self.config.silent || self.client_id.is_none() {
            return None;
        }
        self.cycle += 1;
        let feed = StateFeed {
            cycle: self.cycle,
            timestamp_us: self.started.elapsed().as_micros() as u64,
            status: self.status(),
            states: self.states,
        };
        match encode_state_feed(&feed) {
            Ok(bytes) => {
                self.counters.feeds_sent += 1;
                Some(bytes)
            },
            Err(e) => {
                warn!("Mock controller failed to encode state feed: {}", e);
                None
            },
        }
    }
}

fn protocol_failure(e: rdk_protocol::ProtocolError) -> (ErrorCode, String) {
    (ErrorCode::Unknown, e.to_string())
}

/// 控制器侧链路
enum Link {
    Channel {
        rx: Receiver<Bytes>,
        tx: Sender<Bytes>,
    },
    Udp {
        socket: UdpSocket,
        peer: Option<SocketAddr>,
        buf: Box<[u8]>,
    },
}

impl Link {
    /// `Ok(None)` 表示超时，`Err(())` 表示链路已关闭
    fn recv(&mut self, timeout: Duration) -> Result<Option<Bytes>, ()> {
        match self {
            Link::Channel { rx, .. } => match rx.recv_timeout(timeout) {
                Ok(datagram) => Ok(Some(datagram)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(()),
            },
            Link::Udp { socket, peer, buf } => {
                let _ = socket.set_read_timeout(Some(timeout.max(Duration::from_micros(100))));
                match socket.recv_from(&mut buf[..]) {
                    Ok((len, from)) => {
                        *peer = Some(from);
                        Ok(Some(Bytes::copy_from_slice(&buf[..len])))
                    },
                    Err(_) => Ok(None),
                }
            },
        }
    }

    fn send(&mut self, datagram: Bytes) {
        match self {
            Link::Channel { tx, .. } => {
                let _ = tx.send(datagram);
            },
            Link::Udp { socket, peer, .. } => {
                if let Some(peer) = peer {
                    let _ = socket.send_to(&datagram, *peer);
                }
            },
        }
    }
}

fn run_controller(mut link: Link, state: Arc<Mutex<SimState>>, running: Arc<AtomicBool>) {
    let interval = state.lock().config.feed_interval;
    let mut next_feed = Instant::now() + interval;

    while running.load(Ordering::Acquire) {
        let timeout = next_feed.saturating_duration_since(Instant::now());
        match link.recv(timeout) {
            Ok(Some(datagram)) => {
                let reply = state.lock().handle(&datagram);
                if let Some(reply) = reply {
                    link.send(reply);
                }
            },
            Ok(None) => {},
            Err(()) => {
                debug!("Mock controller link closed");
                break;
            },
        }

        let now = Instant::now();
        if now >= next_feed {
            let feed = state.lock().next_feed();
            if let Some(feed) = feed {
                link.send(feed);
            }
            next_feed += interval;
            if next_feed < now {
                next_feed = now + interval;
            }
        }
    }
}

/// 模拟控制器句柄
///
/// Drop 时停止后台线程。
pub struct MockController {
    state: Arc<Mutex<SimState>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl MockController {
    /// 启动进程内模拟控制器，返回控制器句柄和客户端侧传输
    pub fn spawn(config: MockConfig) -> (Self, MockTransport) {
        let (to_controller, controller_rx) = crossbeam_channel::bounded(256);
        let (controller_tx, from_controller) = crossbeam_channel::bounded(1024);
        let link = Link::Channel {
            rx: controller_rx,
            tx: controller_tx,
        };
        let controller = Self::start(link, config, None);
        let transport = MockTransport {
            tx: to_controller,
            rx: from_controller,
            timeout: crate::udp::DEFAULT_READ_TIMEOUT,
        };
        (controller, transport)
    }

    /// 在 UDP 地址上启动模拟控制器（端口 0 表示由系统分配）
    pub fn spawn_udp(bind_address: &str, config: MockConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(crate::udp::parse_local_address(bind_address)?)?;
        let local_addr = socket.local_addr()?;
        let link = Link::Udp {
            socket,
            peer: None,
            buf: crate::udp::receive_buffer(),
        };
        Ok(Self::start(link, config, Some(local_addr)))
    }

    fn start(link: Link, config: MockConfig, local_addr: Option<SocketAddr>) -> Self {
        let state = Arc::new(Mutex::new(SimState::new(config)));
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let state = state.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("rdk-mock-controller".to_string())
                .spawn(move || run_controller(link, state, running))
                .ok()
        };
        Self {
            state,
            running,
            handle,
            local_addr,
        }
    }

    /// UDP 模式下的监听地址
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn counters(&self) -> MockCounters {
        self.state.lock().counters
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    pub fn is_client_connected(&self) -> bool {
        self.state.lock().client_id.is_some()
    }

    pub fn is_fault(&self) -> bool {
        self.state.lock().fault
    }

    /// 注入/清除故障
    pub fn set_fault(&self, fault: bool) {
        self.state.lock().fault = fault;
    }

    /// 停止/恢复应答
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().config.silent = silent;
    }

    pub fn global_variables(&self) -> GlobalVariables {
        self.state.lock().global_vars.clone()
    }

    pub fn joint_positions(&self) -> [f64; JOINT_DOF] {
        self.state.lock().states.q
    }

    pub fn last_torque_command(&self) -> Option<JointTorqueTarget> {
        self.state.lock().last_torque
    }

    pub fn cartesian_stiffness(&self) -> [f64; WRENCH_LEN] {
        self.state.lock().stiffness
    }

    pub fn null_space_posture(&self) -> [f64; JOINT_DOF] {
        self.state.lock().null_space
    }

    pub fn tcp_index(&self) -> u32 {
        self.state.lock().tcp_index
    }

    pub fn digital_output(&self, port: u8) -> bool {
        self.state
            .lock()
            .digital_outputs
            .get(port as usize)
            .copied()
            .unwrap_or(false)
    }

    /// 停止后台线程（幂等）
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 连接到进程内模拟控制器的客户端传输
pub struct MockTransport {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    timeout: Duration,
}

fn recv_with_timeout(rx: &Receiver<Bytes>, timeout: Duration) -> Result<Bytes, TransportError> {
    match rx.recv_timeout(timeout) {
        Ok(datagram) => Ok(datagram),
        Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
    }
}

impl Transport for MockTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(Bytes::copy_from_slice(datagram))
            .map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        recv_with_timeout(&self.rx, self.timeout)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

impl SplittableTransport for MockTransport {
    type Rx = MockRxTransport;
    type Tx = MockTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        Ok((
            MockRxTransport {
                rx: self.rx,
                timeout: self.timeout,
            },
            MockTxTransport { tx: self.tx },
        ))
    }
}

pub struct MockRxTransport {
    rx: Receiver<Bytes>,
    timeout: Duration,
}

impl RxTransport for MockRxTransport {
    fn receive(&mut self) -> Result<Bytes, TransportError> {
        recv_with_timeout(&self.rx, self.timeout)
    }
}

pub struct MockTxTransport {
    tx: Sender<Bytes>,
}

impl TxTransport for MockTxTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(Bytes::copy_from_slice(datagram))
            .map_err(|_| TransportError::Closed)
    }
}
