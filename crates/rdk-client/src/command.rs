//! 指令分发
//!
//! - 离散指令（NRT 模式）：等待控制器应答
//! - 流式指令（RT 模式）：即发即忘，调用方需按控制器实时周期持续发送
//!
//! 发送前先用本地镜像的模式检查指令是否合法，不合法直接返回
//! [`RobotError::InvalidMode`]，不产生任何网络流量。

use crate::session::{RobotSession, decode_payload};
use crate::types::{Result, RobotError};
use rdk_protocol::codec::{get_bool, get_u8};
use rdk_protocol::{
    CartesianTarget, JOINT_DOF, JointPositionTarget, JointStreamTarget, JointTorqueTarget, Mode,
    POSE_LEN, Request, WRENCH_LEN,
};
use tracing::{info, trace};

/// 拒绝 NaN/Inf
fn ensure_finite(name: &str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(index) => Err(RobotError::InvalidInput(format!(
            "{name}[{index}] is not finite: {}",
            values[index]
        ))),
    }
}

impl RobotSession {
    // ==================== 模式 ====================

    /// 切换控制模式
    pub fn set_mode(&self, mode: Mode) -> Result<()> {
        if mode == Mode::Unknown {
            return Err(RobotError::InvalidInput("cannot switch to UNKNOWN mode".to_string()));
        }
        self.request(&Request::SetMode(mode))?;
        self.driver()?.set_local_mode(mode);
        info!("Mode switched to {}", mode);
        Ok(())
    }

    /// 从控制器读取当前模式，并刷新本地镜像
    pub fn get_mode(&self) -> Result<Mode> {
        let payload = self.request(&Request::GetMode)?;
        let mode = Mode::from(decode_payload(payload, get_u8)?);
        self.driver()?.set_local_mode(mode);
        Ok(mode)
    }

    /// 本地镜像的模式（不产生网络往返）
    pub fn current_mode(&self) -> Mode {
        self.observer().mode()
    }

    // ==================== 离散指令 ====================

    /// 关节位置目标（需要 `NrtJointPosition`）
    pub fn send_joint_position(&self, target: &JointPositionTarget) -> Result<()> {
        ensure_finite("positions", &target.positions)?;
        ensure_finite("velocities", &target.velocities)?;
        ensure_finite("accelerations", &target.accelerations)?;
        ensure_finite("max_velocities", &target.max_velocities)?;
        ensure_finite("max_accelerations", &target.max_accelerations)?;

        let request = Request::SendJointPosition(*target);
        self.ensure_mode(&request)?;
        self.request(&request)?;
        Ok(())
    }

    /// 笛卡尔位姿与力目标（需要 `NrtCartesianMotionForce`）
    pub fn send_cartesian_motion_force(
        &self,
        pose: [f64; POSE_LEN],
        wrench: [f64; WRENCH_LEN],
    ) -> Result<()> {
        ensure_finite("pose", &pose)?;
        ensure_finite("wrench", &wrench)?;

        let request = Request::SendCartesianMotionForce(CartesianTarget { pose, wrench });
        self.ensure_mode(&request)?;
        self.request(&request)?;
        Ok(())
    }

    /// 笛卡尔刚度（任一笛卡尔模式下有效，只影响之后的指令）
    pub fn set_cartesian_stiffness(&self, stiffness: [f64; WRENCH_LEN]) -> Result<()> {
        ensure_finite("stiffness", &stiffness)?;
        let request = Request::SetCartesianStiffness(stiffness);
        self.ensure_mode(&request)?;
        self.request(&request)?;
        Ok(())
    }

    /// 零空间姿态（任一笛卡尔模式下有效，只影响之后的指令）
    pub fn set_null_space_posture(&self, posture: [f64; JOINT_DOF]) -> Result<()> {
        ensure_finite("posture", &posture)?;
        let request = Request::SetNullSpacePosture(posture);
        self.ensure_mode(&request)?;
        self.request(&request)?;
        Ok(())
    }

    /// 切换工具中心点
    pub fn switch_tcp(&self, index: u32) -> Result<()> {
        self.request(&Request::SwitchTcp(index))?;
        info!("Switched to TCP {}", index);
        Ok(())
    }

    pub fn write_digital_output(&self, port: u8, value: bool) -> Result<()> {
        self.request(&Request::WriteDigitalOutput { port, value })?;
        Ok(())
    }

    pub fn read_digital_input(&self, port: u8) -> Result<bool> {
        let payload = self.request(&Request::ReadDigitalInput(port))?;
        decode_payload(payload, |buf| get_bool(buf, "digital_input"))
    }

    // ==================== 流式指令 ====================

    /// 关节力矩流（需要 `RtJointTorque`）
    pub fn stream_joint_torque(
        &self,
        torques: [f64; JOINT_DOF],
        gravity_compensation: bool,
        soft_limits: bool,
    ) -> Result<()> {
        ensure_finite("torques", &torques)?;
        let request = Request::StreamJointTorque(JointTorqueTarget {
            torques,
            gravity_compensation,
            soft_limits,
        });
        self.ensure_mode(&request)?;
        trace!("Streaming joint torques {:?}", torques);
        self.stream(&request)
    }

    /// 关节位置流（需要 `RtJointPosition`）
    pub fn stream_joint_position(
        &self,
        positions: [f64; JOINT_DOF],
        velocities: [f64; JOINT_DOF],
        accelerations: [f64; JOINT_DOF],
    ) -> Result<()> {
        ensure_finite("positions", &positions)?;
        ensure_finite("velocities", &velocities)?;
        ensure_finite("accelerations", &accelerations)?;
        let request = Request::StreamJointPosition(JointStreamTarget {
            positions,
            velocities,
            accelerations,
        });
        self.ensure_mode(&request)?;
        self.stream(&request)
    }

    /// 笛卡尔位姿与力流（需要 `RtCartesianMotionForce`）
    pub fn stream_cartesian_motion_force(
        &self,
        pose: [f64; POSE_LEN],
        wrench: [f64; WRENCH_LEN],
    ) -> Result<()> {
        ensure_finite("pose", &pose)?;
        ensure_finite("wrench", &wrench)?;
        let request = Request::StreamCartesianMotionForce(CartesianTarget { pose, wrench });
        self.ensure_mode(&request)?;
        self.stream(&request)
    }
}
