//! 机器人状态结构定义
//!
//! 每个物理量都是完整的定长数组（而不是指向首元素的指针），
//! 长度由下方常量给出，并在从线数据构造时校验。

use crate::ProtocolError;
use crate::codec::{get_f64_array, get_u8, get_u64, put_f64_array};
use crate::status::StatusFlags;
use bytes::{Buf, BufMut};

/// 关节自由度
pub const JOINT_DOF: usize = 7;
/// 位姿长度 `[x, y, z, qw, qx, qy, qz]`
pub const POSE_LEN: usize = 7;
/// 速度旋量长度 `[vx, vy, vz, wx, wy, wz]`
pub const TWIST_LEN: usize = 6;
/// 力旋量长度 `[fx, fy, fz, mx, my, mz]`
pub const WRENCH_LEN: usize = 6;

/// 机器人状态（单个控制周期的原子采样）
///
/// 大小：864 字节（108 个 `f64`），Clone 开销低
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotStates {
    /// 关节位置（连杆侧，rad）
    pub q: [f64; JOINT_DOF],
    /// 关节位置（电机侧，rad）
    pub theta: [f64; JOINT_DOF],
    /// 关节速度（连杆侧，rad/s）
    pub dq: [f64; JOINT_DOF],
    /// 关节速度（电机侧，rad/s）
    pub dtheta: [f64; JOINT_DOF],
    /// 关节力矩（N·m）
    pub tau: [f64; JOINT_DOF],
    /// 期望关节力矩（N·m）
    pub tau_des: [f64; JOINT_DOF],
    /// 关节力矩导数（N·m/s）
    pub tau_dot: [f64; JOINT_DOF],
    /// 外部关节力矩估计（N·m）
    pub tau_ext: [f64; JOINT_DOF],
    /// TCP 位姿（基坐标系）
    pub tcp_pose: [f64; POSE_LEN],
    /// 期望 TCP 位姿
    pub tcp_pose_des: [f64; POSE_LEN],
    /// TCP 速度
    pub tcp_vel: [f64; TWIST_LEN],
    /// 相机位姿
    pub cam_pose: [f64; POSE_LEN],
    /// 法兰位姿
    pub flange_pose: [f64; POSE_LEN],
    /// 力/力矩传感器原始读数
    pub ft_sensor_raw: [f64; WRENCH_LEN],
    /// TCP 坐标系下的外力旋量
    pub ext_wrench_in_tcp: [f64; WRENCH_LEN],
    /// 基坐标系下的外力旋量
    pub ext_wrench_in_base: [f64; WRENCH_LEN],
}

impl Default for RobotStates {
    fn default() -> Self {
        Self {
            q: [0.0; JOINT_DOF],
            theta: [0.0; JOINT_DOF],
            dq: [0.0; JOINT_DOF],
            dtheta: [0.0; JOINT_DOF],
            tau: [0.0; JOINT_DOF],
            tau_des: [0.0; JOINT_DOF],
            tau_dot: [0.0; JOINT_DOF],
            tau_ext: [0.0; JOINT_DOF],
            tcp_pose: IDENTITY_POSE,
            tcp_pose_des: IDENTITY_POSE,
            tcp_vel: [0.0; TWIST_LEN],
            cam_pose: IDENTITY_POSE,
            flange_pose: IDENTITY_POSE,
            ft_sensor_raw: [0.0; WRENCH_LEN],
            ext_wrench_in_tcp: [0.0; WRENCH_LEN],
            ext_wrench_in_base: [0.0; WRENCH_LEN],
        }
    }
}

/// 原点位姿（单位四元数）
pub const IDENTITY_POSE: [f64; POSE_LEN] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

impl RobotStates {
    /// `f64` 元素总数
    pub const VALUE_COUNT: usize =
        8 * JOINT_DOF + 4 * POSE_LEN + TWIST_LEN + 3 * WRENCH_LEN;

    /// 线上长度（字节）
    pub const WIRE_LEN: usize = Self::VALUE_COUNT * 8;

    /// 编码（字段顺序即线上顺序）
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        put_f64_array(buf, &self.q);
        put_f64_array(buf, &self.theta);
        put_f64_array(buf, &self.dq);
        put_f64_array(buf, &self.dtheta);
        put_f64_array(buf, &self.tau);
        put_f64_array(buf, &self.tau_des);
        put_f64_array(buf, &self.tau_dot);
        put_f64_array(buf, &self.tau_ext);
        put_f64_array(buf, &self.tcp_pose);
        put_f64_array(buf, &self.tcp_pose_des);
        put_f64_array(buf, &self.tcp_vel);
        put_f64_array(buf, &self.cam_pose);
        put_f64_array(buf, &self.flange_pose);
        put_f64_array(buf, &self.ft_sensor_raw);
        put_f64_array(buf, &self.ext_wrench_in_tcp);
        put_f64_array(buf, &self.ext_wrench_in_base);
    }

    /// 解码并校验
    ///
    /// # 错误
    /// - `ProtocolError::InvalidLength`: 剩余字节不足 `WIRE_LEN`
    /// - `ProtocolError::InvalidValue`: 任一元素为 NaN/Inf
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        if buf.remaining() < Self::WIRE_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: Self::WIRE_LEN,
                actual: buf.remaining(),
            });
        }

        Ok(Self {
            q: get_f64_array(buf, "q")?,
            theta: get_f64_array(buf, "theta")?,
            dq: get_f64_array(buf, "dq")?,
            dtheta: get_f64_array(buf, "dtheta")?,
            tau: get_f64_array(buf, "tau")?,
            tau_des: get_f64_array(buf, "tau_des")?,
            tau_dot: get_f64_array(buf, "tau_dot")?,
            tau_ext: get_f64_array(buf, "tau_ext")?,
            tcp_pose: get_f64_array(buf, "tcp_pose")?,
            tcp_pose_des: get_f64_array(buf, "tcp_pose_des")?,
            tcp_vel: get_f64_array(buf, "tcp_vel")?,
            cam_pose: get_f64_array(buf, "cam_pose")?,
            flange_pose: get_f64_array(buf, "flange_pose")?,
            ft_sensor_raw: get_f64_array(buf, "ft_sensor_raw")?,
            ext_wrench_in_tcp: get_f64_array(buf, "ext_wrench_in_tcp")?,
            ext_wrench_in_base: get_f64_array(buf, "ext_wrench_in_base")?,
        })
    }
}

/// 状态推送帧（控制器 → 客户端，每个控制周期一帧）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateFeed {
    /// 控制周期计数（单调递增，从 1 开始）
    pub cycle: u64,
    /// 控制器时间戳（微秒，控制器相对时间）
    pub timestamp_us: u64,
    /// 同周期采样的状态位
    pub status: StatusFlags,
    /// 状态数组
    pub states: RobotStates,
}

impl StateFeed {
    /// 消息体长度（不含消息头）
    pub const BODY_LEN: usize = 8 + 8 + 1 + RobotStates::WIRE_LEN;

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.cycle);
        buf.put_u64_le(self.timestamp_us);
        buf.put_u8(self.status.to_byte());
        self.states.encode(buf);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        if buf.remaining() != Self::BODY_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: Self::BODY_LEN,
                actual: buf.remaining(),
            });
        }
        let cycle = get_u64(buf)?;
        let timestamp_us = get_u64(buf)?;
        let status = StatusFlags::from_byte(get_u8(buf)?);
        let states = RobotStates::decode(buf)?;
        Ok(Self {
            cycle,
            timestamp_us,
            status,
            states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn sample_states(seed: f64) -> RobotStates {
        let mut states = RobotStates::default();
        for i in 0..JOINT_DOF {
            states.q[i] = seed + i as f64 * 0.1;
            states.tau_ext[i] = -seed;
        }
        states.tcp_pose = [0.5, 0.1, 0.3, 1.0, 0.0, 0.0, 0.0];
        states.ext_wrench_in_base = [1.0, 2.0, 3.0, 0.1, 0.2, 0.3];
        states
    }

    #[test]
    fn test_wire_len() {
        assert_eq!(RobotStates::VALUE_COUNT, 108);
        assert_eq!(RobotStates::WIRE_LEN, 864);
    }

    #[test]
    fn test_all_elements_of_each_field_survive() {
        // 每个字段的全部元素都应被传输，而不仅是首元素
        let states = sample_states(0.25);
        let mut buf = BytesMut::new();
        states.encode(&mut buf);
        assert_eq!(buf.len(), RobotStates::WIRE_LEN);

        let mut reader = &buf[..];
        let decoded = RobotStates::decode(&mut reader).unwrap();
        assert_eq!(decoded.q[6], states.q[6]);
        assert!(decoded.q[6] > 0.8);
        assert_eq!(decoded.tau_ext[6], -0.25);
        assert_eq!(decoded.ext_wrench_in_base[5], 0.3);
        assert_eq!(decoded, states);
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        let payload = vec![0u8; RobotStates::WIRE_LEN - 8];
        let mut reader = &payload[..];
        assert!(matches!(
            RobotStates::decode(&mut reader),
            Err(ProtocolError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_infinite_value() {
        let mut states = sample_states(1.0);
        states.flange_pose[3] = f64::INFINITY;
        let mut buf = BytesMut::new();
        states.encode(&mut buf);

        let mut reader = &buf[..];
        match RobotStates::decode(&mut reader) {
            Err(ProtocolError::InvalidValue { field, .. }) => assert_eq!(field, "flange_pose[3]"),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_state_feed_rejects_trailing_bytes() {
        let feed = StateFeed {
            cycle: 42,
            timestamp_us: 1_000,
            status: StatusFlags::from_byte(0b1001),
            states: sample_states(0.5),
        };
        let mut buf = BytesMut::new();
        feed.encode(&mut buf);
        buf.put_u8(0xEE);

        let mut reader = &buf[..];
        assert!(StateFeed::decode(&mut reader).is_err());
    }
}
