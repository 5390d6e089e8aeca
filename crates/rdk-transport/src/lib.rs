//! # RDK Transport Layer
//!
//! 数据报传输抽象层：驱动层只依赖这里的 trait，不关心底层是 UDP 还是模拟控制器。
//!
//! - [`udp::UdpTransport`]: 真实控制器（UDP）
//! - `mock::MockController`（`mock` feature）: 进程内模拟控制器

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub mod udp;

#[cfg(feature = "mock")]
pub mod mock;

pub use udp::{UdpRxTransport, UdpTransport, UdpTxTransport};

#[cfg(feature = "mock")]
pub use mock::{MockConfig, MockController, MockTransport};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Transport closed")]
    Closed,
    #[error("Invalid address: {0}")]
    AddressParse(String),
}

impl TransportError {
    /// 对端不可达（UDP 下通常是 ICMP port unreachable）
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionRefused
        )
    }
}

/// 双向数据报传输
pub trait Transport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError>;

    /// 接收一个数据报，超过读超时返回 `TransportError::Timeout`
    fn receive(&mut self) -> Result<Bytes, TransportError>;

    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    fn receive_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    fn try_receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(datagram) => Ok(Some(datagram)),
            Err(TransportError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 只读半边（IO 线程持有）
pub trait RxTransport: Send {
    fn receive(&mut self) -> Result<Bytes, TransportError>;
}

/// 只写半边（请求方持有，受互斥锁保护）
pub trait TxTransport: Send {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError>;
}

/// 可分离为独立 RX/TX 半边的传输
pub trait SplittableTransport: Transport {
    type Rx: RxTransport + 'static;
    type Tx: TxTransport + 'static;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

impl<T: TxTransport + ?Sized> TxTransport for Box<T> {
    fn send(&mut self, datagram: &[u8]) -> Result<(), TransportError> {
        (**self).send(datagram)
    }
}

impl<T: RxTransport + ?Sized> RxTransport for Box<T> {
    fn receive(&mut self) -> Result<Bytes, TransportError> {
        (**self).receive()
    }
}
