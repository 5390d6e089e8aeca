//! UDP 传输
//!
//! 本地 socket 绑定在 `local_address`（端口由系统分配），并 `connect()` 到控制器地址，
//! 因此只会收到来自控制器的数据报。
//!
//! 分离后的 RX/TX 半边通过 `try_clone()` 共享同一个 socket：
//! **不要**在分离后调用 `set_nonblocking()`，超时只通过 `SO_RCVTIMEO` 实现。

use crate::{RxTransport, SplittableTransport, Transport, TransportError};
use bytes::Bytes;
use rdk_protocol::DEFAULT_CONTROLLER_PORT;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{debug, trace};

/// 接收缓冲区长度（覆盖消息头 `length` 字段的全部取值，不会截断）
pub const MAX_DATAGRAM_LEN: usize = u16::MAX as usize;

/// 分配接收缓冲区
pub(crate) fn receive_buffer() -> Box<[u8]> {
    vec![0u8; MAX_DATAGRAM_LEN].into_boxed_slice()
}

/// 默认读超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// 解析控制器地址，未指定端口时使用 `DEFAULT_CONTROLLER_PORT`
///
/// ```
/// use rdk_transport::udp::parse_robot_address;
///
/// let addr = parse_robot_address("192.168.2.100").unwrap();
/// assert_eq!(addr.port(), rdk_protocol::DEFAULT_CONTROLLER_PORT);
///
/// let addr = parse_robot_address("127.0.0.1:7000").unwrap();
/// assert_eq!(addr.port(), 7000);
/// ```
pub fn parse_robot_address(address: &str) -> Result<SocketAddr, TransportError> {
    resolve(address, DEFAULT_CONTROLLER_PORT)
}

/// 解析本地地址，未指定端口时由系统分配
pub fn parse_local_address(address: &str) -> Result<SocketAddr, TransportError> {
    resolve(address, 0)
}

fn resolve(address: &str, default_port: u16) -> Result<SocketAddr, TransportError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(TransportError::AddressParse("empty address".to_string()));
    }
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    // 主机名（可带端口）
    let candidates = if address.contains(':') {
        address.to_socket_addrs()
    } else {
        (address, default_port).to_socket_addrs()
    };
    candidates
        .map_err(|e| TransportError::AddressParse(format!("{address}: {e}")))?
        .next()
        .ok_or_else(|| TransportError::AddressParse(address.to_string()))
}

fn map_recv_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout,
        _ => TransportError::Io(e),
    }
}

fn recv_datagram(socket: &UdpSocket, buf: &mut [u8]) -> Result<Bytes, TransportError> {
    let len = socket.recv(buf).map_err(map_recv_error)?;
    trace!("UDP received {} bytes", len);
    Ok(Bytes::copy_from_slice(&buf[..len]))
}

/// UDP 传输（未分离）
pub struct UdpTransport {
    socket: UdpSocket,
    robot_addr: SocketAddr,
    read_timeout: Duration,
    buf: Box<[u8]>,
}

impl UdpTransport {
    /// 绑定本地地址并连接到控制器
    ///
    /// # 错误
    /// - `TransportError::AddressParse`: 地址无法解析
    /// - `TransportError::Io`: 绑定失败（例如本地地址不属于本机）
    pub fn connect(robot_address: &str, local_address: &str) -> Result<Self, TransportError> {
        let robot_addr = parse_robot_address(robot_address)?;
        let local_addr = parse_local_address(local_address)?;

        let socket = UdpSocket::bind(local_addr)?;
        socket.connect(robot_addr)?;
        socket.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;

        debug!(
            "UDP transport bound to {} -> {}",
            socket.local_addr()?,
            robot_addr
        );

        Ok(Self {
            socket,
            robot_addr,
            read_timeout: DEFAULT_READ_TIMEOUT,
            buf: receive_buffer(),
        })
    }

    pub fn robot_addr(&self) -> SocketAddr {
        self.robot_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        self.socket.send(datagram)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        recv_datagram(&self.socket, &mut self.buf[..])
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        // SO_RCVTIMEO 不接受 0，用最小值代替
        let timeout = timeout.max(Duration::from_micros(1));
        if self.socket.set_read_timeout(Some(timeout)).is_ok() {
            self.read_timeout = timeout;
        }
    }
}

impl SplittableTransport for UdpTransport {
    type Rx = UdpRxTransport;
    type Tx = UdpTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        let tx_socket = self.socket.try_clone()?;
        Ok((
            UdpRxTransport {
                socket: self.socket,
                buf: self.buf,
            },
            UdpTxTransport { socket: tx_socket },
        ))
    }
}

/// UDP 只读半边
pub struct UdpRxTransport {
    socket: UdpSocket,
    buf: Box<[u8]>,
}

impl RxTransport for UdpRxTransport {
    fn receive(&mut self) -> Result<Bytes, TransportError> {
        recv_datagram(&self.socket, &mut self.buf[..])
    }
}

/// UDP 只写半边
pub struct UdpTxTransport {
    socket: UdpSocket,
}

impl crate::TxTransport for UdpTxTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        self.socket.send(datagram)?;
        Ok(())
    }
}
