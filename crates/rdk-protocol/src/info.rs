//! 机器人静态信息

use crate::ProtocolError;
use crate::codec::{get_f64_array, get_str, get_u8, put_f64_array, put_str};
use crate::state::{JOINT_DOF, WRENCH_LEN};
use bytes::{Buf, BufMut};

/// 机器人静态信息（`GetRobotInfo` 响应）
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotInfo {
    /// 序列号
    pub serial_number: String,
    /// 控制器软件版本
    pub software_version: String,
    /// 自由度
    pub dof: u8,
    /// 名义笛卡尔刚度 `[kx, ky, kz, krx, kry, krz]`
    pub k_x_nom: [f64; WRENCH_LEN],
    /// 关节位置下限（rad）
    pub q_min: [f64; JOINT_DOF],
    /// 关节位置上限（rad）
    pub q_max: [f64; JOINT_DOF],
    /// 关节速度上限（rad/s）
    pub dq_max: [f64; JOINT_DOF],
    /// 关节力矩上限（N·m）
    pub tau_max: [f64; JOINT_DOF],
}

impl RobotInfo {
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), ProtocolError> {
        put_str(buf, &self.serial_number)?;
        put_str(buf, &self.software_version)?;
        buf.put_u8(self.dof);
        put_f64_array(buf, &self.k_x_nom);
        put_f64_array(buf, &self.q_min);
        put_f64_array(buf, &self.q_max);
        put_f64_array(buf, &self.dq_max);
        put_f64_array(buf, &self.tau_max);
        Ok(())
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self {
            serial_number: get_str(buf)?,
            software_version: get_str(buf)?,
            dof: get_u8(buf)?,
            k_x_nom: get_f64_array(buf, "k_x_nom")?,
            q_min: get_f64_array(buf, "q_min")?,
            q_max: get_f64_array(buf, "q_max")?,
            dq_max: get_f64_array(buf, "dq_max")?,
            tau_max: get_f64_array(buf, "tau_max")?,
        })
    }

    /// 检查关节位置是否在限位内
    pub fn check_joint_position(&self, joint_index: usize, position: f64) -> bool {
        if joint_index >= JOINT_DOF {
            return false;
        }
        position >= self.q_min[joint_index] && position <= self.q_max[joint_index]
    }
}
