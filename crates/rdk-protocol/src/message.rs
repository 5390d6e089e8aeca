//! 消息头与消息编解码
//!
//! 每个 UDP 数据报是一条完整消息：8 字节消息头 + 消息体。
//!
//! ```text
//! | msg_type u8 | flags u8 | length u16 | reserved u8 | seq u24 |
//! ```
//!
//! `length` 为整条消息（含消息头）的字节数；`seq` 只使用 24 位，
//! 用于将 `Response` 与对应的 `Request` 匹配。

use crate::ProtocolError;
use crate::ProtocolVersion;
use crate::codec::{get_u8, get_u32};
use crate::request::Request;
use crate::state::StateFeed;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 消息头长度
pub const HEADER_LEN: usize = 8;

/// 单条消息最大长度（IPv4 下 UDP 负载上限）
pub const MAX_MESSAGE_LEN: usize = 65_507;

/// 序列号掩码（24 位）
pub const SEQ_MASK: u32 = 0x00FF_FFFF;

// ============================================================================
// Message Types
// ============================================================================

/// 消息类型
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
pub enum MessageType {
    // 客户端 → 控制器
    Heartbeat = 0x00,
    Connect = 0x01,
    Disconnect = 0x02,
    Request = 0x10, // 需要应答
    Stream = 0x11,  // 不应答

    // 控制器 → 客户端
    ConnectAck = 0x81,
    DisconnectAck = 0x82,
    StateFeed = 0x83,
    Response = 0x85,
    Error = 0xFF,
}

// ============================================================================
// Error Codes
// ============================================================================

/// 控制器返回的状态码
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::FromPrimitive)]
pub enum ErrorCode {
    Ok = 0,
    #[default]
    Unknown = 1,
    InvalidMessage = 2,
    NotConnected = 3,
    InvalidMode = 4,
    Fault = 5,
    Busy = 6,
    NotFound = 7,
    Rejected = 8,
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::Ok => "ok",
            ErrorCode::Unknown => "unknown error",
            ErrorCode::InvalidMessage => "invalid message",
            ErrorCode::NotConnected => "not connected",
            ErrorCode::InvalidMode => "invalid mode",
            ErrorCode::Fault => "fault",
            ErrorCode::Busy => "busy",
            ErrorCode::NotFound => "not found",
            ErrorCode::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Message Header
// ============================================================================

/// 消息头（8 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub msg_type: MessageType,
    pub flags: u8,
    pub length: u16,
    pub reserved: u8,
    pub seq: u32,
}

impl MessageHeader {
    pub fn new(msg_type: MessageType, length: u16, seq: u32) -> Self {
        Self {
            msg_type,
            flags: 0,
            length,
            reserved: 0,
            seq: seq & SEQ_MASK,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.msg_type as u8);
        buf.put_u8(self.flags);
        buf.put_u16_le(self.length);
        buf.put_u8(self.reserved);
        buf.put_slice(&self.seq.to_le_bytes()[..3]);
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::TooShort);
        }

        let msg_type =
            MessageType::try_from(buf[0]).map_err(|_| ProtocolError::InvalidMessageType(buf[0]))?;
        let length = u16::from_le_bytes([buf[2], buf[3]]);
        // 高字节为 0（只使用 24 位）
        let seq = u32::from_le_bytes([buf[5], buf[6], buf[7], 0]);

        Ok(Self {
            msg_type,
            flags: buf[1],
            length,
            reserved: buf[4],
            seq,
        })
    }
}

// ============================================================================
// Message Enum
// ============================================================================

/// 协议消息
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Heartbeat {
        client_id: u32,
    },
    Connect {
        client_id: u32,
        version: ProtocolVersion,
    },
    Disconnect {
        client_id: u32,
    },
    Request(Request),
    Stream(Request),
    ConnectAck {
        client_id: u32,
        status: ErrorCode,
        version: ProtocolVersion,
        /// 控制器报告的自由度
        dof: u8,
    },
    DisconnectAck,
    StateFeed(Box<StateFeed>),
    /// 应答：`status` 为 `Ok` 时 `payload` 为按操作码定义的结果，否则为错误文本
    Response {
        status: ErrorCode,
        payload: Bytes,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl Message {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Heartbeat { .. } => MessageType::Heartbeat,
            Message::Connect { .. } => MessageType::Connect,
            Message::Disconnect { .. } => MessageType::Disconnect,
            Message::Request(_) => MessageType::Request,
            Message::Stream(_) => MessageType::Stream,
            Message::ConnectAck { .. } => MessageType::ConnectAck,
            Message::DisconnectAck => MessageType::DisconnectAck,
            Message::StateFeed(_) => MessageType::StateFeed,
            Message::Response { .. } => MessageType::Response,
            Message::Error { .. } => MessageType::Error,
        }
    }

    /// 编码为完整数据报（消息头 + 消息体）
    pub fn encode(&self, seq: u32) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(64);
        // 先占位消息头，消息体写完后回填长度
        buf.put_bytes(0, HEADER_LEN);

        match self {
            Message::Heartbeat { client_id } | Message::Disconnect { client_id } => {
                buf.put_u32_le(*client_id);
            },
            Message::Connect { client_id, version } => {
                buf.put_u32_le(*client_id);
                buf.put_slice(&version.to_bytes());
            },
            Message::Request(request) => {
                if request.is_streaming() {
                    return Err(ProtocolError::Malformed(format!(
                        "{:?} must be sent as a stream message",
                        request.opcode()
                    )));
                }
                request.encode(&mut buf)?;
            },
            Message::Stream(request) => {
                if !request.is_streaming() {
                    return Err(ProtocolError::Malformed(format!(
                        "{:?} cannot be streamed",
                        request.opcode()
                    )));
                }
                request.encode(&mut buf)?;
            },
            Message::ConnectAck {
                client_id,
                status,
                version,
                dof,
            } => {
                buf.put_u32_le(*client_id);
                buf.put_u8(*status as u8);
                buf.put_slice(&version.to_bytes());
                buf.put_u8(*dof);
            },
            Message::DisconnectAck => {},
            Message::StateFeed(feed) => feed.encode(&mut buf),
            Message::Response { status, payload } => {
                buf.put_u8(*status as u8);
                buf.put_slice(payload);
            },
            Message::Error { code, message } => {
                buf.put_u8(*code as u8);
                buf.put_slice(message.as_bytes());
            },
        }

        if buf.len() > MAX_MESSAGE_LEN {
            return Err(ProtocolError::TooLong {
                len: buf.len(),
                max: MAX_MESSAGE_LEN,
            });
        }
        let length = buf.len() as u16;
        let header = MessageHeader::new(self.msg_type(), length, seq);
        let mut head = &mut buf[..HEADER_LEN];
        header.encode(&mut head);
        Ok(buf.freeze())
    }
}

/// 编码心跳消息
pub fn encode_heartbeat(client_id: u32, seq: u32) -> Result<Bytes, ProtocolError> {
    Message::Heartbeat { client_id }.encode(seq)
}

/// 编码 Connect 消息
pub fn encode_connect(
    client_id: u32,
    version: ProtocolVersion,
    seq: u32,
) -> Result<Bytes, ProtocolError> {
    Message::Connect { client_id, version }.encode(seq)
}

/// 编码 Disconnect 消息
pub fn encode_disconnect(client_id: u32, seq: u32) -> Result<Bytes, ProtocolError> {
    Message::Disconnect { client_id }.encode(seq)
}

/// 编码请求（流式请求自动使用 `Stream` 消息类型）
pub fn encode_request(request: &Request, seq: u32) -> Result<Bytes, ProtocolError> {
    if request.is_streaming() {
        Message::Stream(request.clone()).encode(seq)
    } else {
        Message::Request(request.clone()).encode(seq)
    }
}

/// 编码成功应答
pub fn encode_response(payload: Bytes, seq: u32) -> Result<Bytes, ProtocolError> {
    Message::Response {
        status: ErrorCode::Ok,
        payload,
    }
    .encode(seq)
}

/// 编码失败应答（携带错误文本）
pub fn encode_error_response(
    status: ErrorCode,
    message: &str,
    seq: u32,
) -> Result<Bytes, ProtocolError> {
    Message::Response {
        status,
        payload: Bytes::copy_from_slice(message.as_bytes()),
    }
    .encode(seq)
}

/// 编码状态推送帧
pub fn encode_state_feed(feed: &StateFeed) -> Result<Bytes, ProtocolError> {
    Message::StateFeed(Box::new(*feed)).encode(0)
}

/// 解码完整数据报
///
/// # 错误
/// - `ProtocolError::TooShort`: 不足一个消息头
/// - `ProtocolError::InvalidLength`: 消息头长度与数据报长度不一致
/// - 其他：消息体格式错误
pub fn decode_message(datagram: &[u8]) -> Result<(MessageHeader, Message), ProtocolError> {
    let header = MessageHeader::decode(datagram)?;
    if header.length as usize != datagram.len() {
        return Err(ProtocolError::InvalidLength {
            expected: header.length as usize,
            actual: datagram.len(),
        });
    }

    let mut body = &datagram[HEADER_LEN..];
    let message = match header.msg_type {
        MessageType::Heartbeat => Message::Heartbeat {
            client_id: get_u32(&mut body)?,
        },
        MessageType::Disconnect => Message::Disconnect {
            client_id: get_u32(&mut body)?,
        },
        MessageType::Connect => Message::Connect {
            client_id: get_u32(&mut body)?,
            version: get_version(&mut body)?,
        },
        MessageType::Request => {
            let request = Request::decode(&mut body)?;
            if request.is_streaming() {
                return Err(ProtocolError::Malformed(format!(
                    "{:?} sent as request",
                    request.opcode()
                )));
            }
            Message::Request(request)
        },
        MessageType::Stream => {
            let request = Request::decode(&mut body)?;
            if !request.is_streaming() {
                return Err(ProtocolError::Malformed(format!(
                    "{:?} sent as stream",
                    request.opcode()
                )));
            }
            Message::Stream(request)
        },
        MessageType::ConnectAck => Message::ConnectAck {
            client_id: get_u32(&mut body)?,
            status: ErrorCode::from(get_u8(&mut body)?),
            version: get_version(&mut body)?,
            dof: get_u8(&mut body)?,
        },
        MessageType::DisconnectAck => Message::DisconnectAck,
        MessageType::StateFeed => Message::StateFeed(Box::new(StateFeed::decode(&mut body)?)),
        MessageType::Response => {
            let status = ErrorCode::from(get_u8(&mut body)?);
            let payload = body.copy_to_bytes(body.remaining());
            Message::Response { status, payload }
        },
        MessageType::Error => {
            let code = ErrorCode::from(get_u8(&mut body)?);
            let message = std::str::from_utf8(body)
                .map_err(|_| ProtocolError::InvalidUtf8)?
                .to_string();
            body.advance(body.len());
            Message::Error { code, message }
        },
    };

    if body.has_remaining() {
        return Err(ProtocolError::Malformed(format!(
            "{} trailing bytes in {:?}",
            body.remaining(),
            header.msg_type
        )));
    }

    Ok((header, message))
}

fn get_version<B: Buf>(buf: &mut B) -> Result<ProtocolVersion, ProtocolError> {
    Ok(ProtocolVersion::from_bytes([
        get_u8(buf)?,
        get_u8(buf)?,
        get_u8(buf)?,
    ]))
}
