//! Pipeline IO 循环模块
//!
//! RX 线程负责：
//! - 接收并解码数据报
//! - 状态推送帧：整帧发布到 `ArcSwap`
//! - 应答：按序列号交给正在等待的请求方，过期应答丢弃
//! - 按间隔发送心跳（TX 正被占用时跳过本次）

use crate::liveness::FeedbackSource;
use crate::metrics::DriverMetrics;
use crate::state::{RobotContext, RobotStateSnapshot};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use rdk_protocol::{Message, decode_message, encode_heartbeat};
use rdk_transport::{RxTransport, TransportError, TxTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 没有正在等待应答的请求
pub(crate) const NO_PENDING: u32 = u32::MAX;

/// Pipeline 配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 接收超时（毫秒），决定 RX 线程检查停止标志的最长间隔
    pub receive_timeout_ms: u64,
    /// 心跳间隔（毫秒），0 表示不发送心跳
    pub heartbeat_interval_ms: u64,
    /// 应答通道容量
    pub reply_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 20,
            heartbeat_interval_ms: 200,
            reply_channel_capacity: 16,
        }
    }
}

/// 交给请求方的应答（Response / DisconnectAck / Error）
#[derive(Debug, Clone)]
pub struct Reply {
    pub seq: u32,
    pub message: Message,
}

/// 共享的 TX 半边
pub type SharedTx = Arc<Mutex<Box<dyn TxTransport>>>;

/// RX 线程所需的共享句柄
pub struct RxShared {
    pub ctx: Arc<RobotContext>,
    pub replies: Sender<Reply>,
    pub pending_seq: Arc<AtomicU32>,
    pub tx: SharedTx,
    pub client_id: u32,
    pub metrics: Arc<DriverMetrics>,
}

/// RX 线程主循环
pub fn rx_loop(
    mut rx: impl RxTransport,
    shared: RxShared,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
) {
    let RxShared {
        ctx,
        replies,
        pending_seq,
        tx,
        client_id,
        metrics,
    } = shared;

    let heartbeat_interval = Duration::from_millis(config.heartbeat_interval_ms);
    let mut last_heartbeat = Instant::now();

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        if !heartbeat_interval.is_zero() && last_heartbeat.elapsed() >= heartbeat_interval {
            send_heartbeat(&tx, client_id, &metrics);
            last_heartbeat = Instant::now();
        }

        let datagram = match rx.receive() {
            Ok(datagram) => {
                metrics.rx_datagrams_total.fetch_add(1, Ordering::Relaxed);
                datagram
            },
            Err(TransportError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(TransportError::Closed) => {
                debug!("RX thread: transport closed, exiting");
                break;
            },
            Err(e) => {
                // UDP 下 ICMP 不可达会以错误形式出现在接收端，不是致命错误
                warn!("RX thread: receive error: {}", e);
                std::thread::sleep(Duration::from_millis(config.receive_timeout_ms.max(1)));
                continue;
            },
        };

        let (header, message) = match decode_message(&datagram) {
            Ok(decoded) => decoded,
            Err(e) => {
                metrics.rx_invalid.fetch_add(1, Ordering::Relaxed);
                debug!("RX thread: dropping invalid datagram: {}", e);
                continue;
            },
        };

        match message {
            Message::StateFeed(feed) => {
                metrics.rx_state_feeds.fetch_add(1, Ordering::Relaxed);
                let snapshot = RobotStateSnapshot::from_feed(&feed, Instant::now());
                if !ctx.publish(snapshot).is_published() {
                    trace!("RX thread: dropping out-of-order state feed (cycle {})", feed.cycle);
                }
            },
            message @ (Message::Response { .. }
            | Message::DisconnectAck
            | Message::Error { .. }
            | Message::ConnectAck { .. }) => {
                ctx.monitor.record(FeedbackSource::Reply);
                let expected = pending_seq.load(Ordering::Acquire);
                if header.seq != expected {
                    metrics.rx_stale_replies.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "RX thread: dropping stale reply seq={} (expected {})",
                        header.seq, expected
                    );
                    continue;
                }

                let reply = Reply {
                    seq: header.seq,
                    message,
                };
                match replies.try_send(reply) {
                    Ok(()) => {
                        metrics.rx_replies.fetch_add(1, Ordering::Relaxed);
                    },
                    Err(TrySendError::Full(_)) => {
                        metrics.rx_stale_replies.fetch_add(1, Ordering::Relaxed);
                        warn!("RX thread: reply channel full, dropping reply");
                    },
                    Err(TrySendError::Disconnected(_)) => {
                        debug!("RX thread: reply channel closed, exiting");
                        break;
                    },
                }
            },
            other => {
                trace!("RX thread: ignoring {:?}", other.msg_type());
            },
        }
    }
}

fn send_heartbeat(tx: &SharedTx, client_id: u32, metrics: &DriverMetrics) {
    // TX 正被占用时跳过本次
    let Some(mut tx) = tx.try_lock() else {
        return;
    };
    let datagram = match encode_heartbeat(client_id, 0) {
        Ok(datagram) => datagram,
        Err(e) => {
            warn!("Failed to encode heartbeat: {}", e);
            return;
        },
    };
    match tx.send(&datagram) {
        Ok(()) => {
            metrics.tx_heartbeats.fetch_add(1, Ordering::Relaxed);
        },
        Err(e) => {
            metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
            trace!("Failed to send heartbeat: {}", e);
        },
    }
}
