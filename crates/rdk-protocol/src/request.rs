//! 请求定义
//!
//! 客户端发往控制器的所有操作。离散请求（`Request` 消息）由控制器应答，
//! 流式请求（`Stream` 消息）不应答，以控制器实时周期持续发送。

use crate::ProtocolError;
use crate::codec::{
    get_bool, get_f64_array, get_str, get_u8, get_u32, put_bool, put_f64_array, put_str,
};
use crate::mode::Mode;
use crate::plan::GlobalVariables;
use crate::state::{JOINT_DOF, POSE_LEN, WRENCH_LEN};
use bytes::{Buf, BufMut};

/// 请求操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum Opcode {
    // 会话/状态
    Enable = 0x01,
    Stop = 0x02,
    ClearFault = 0x03,
    StartAutoRecovery = 0x04,
    GetStatus = 0x05,
    GetRobotInfo = 0x06,

    // 模式
    SetMode = 0x10,
    GetMode = 0x11,
    SwitchTcp = 0x12,

    // 任务/原语
    ExecutePlan = 0x20,
    ExecutePlanByName = 0x21,
    PausePlan = 0x22,
    GetPlanNameList = 0x23,
    GetPlanInfo = 0x24,
    ExecutePrimitive = 0x25,
    GetPrimitiveStates = 0x26,
    SetGlobalVariables = 0x27,
    GetGlobalVariables = 0x28,

    // 离散运动指令
    SendJointPosition = 0x30,
    SendCartesianMotionForce = 0x31,
    SetCartesianStiffness = 0x32,
    SetNullSpacePosture = 0x33,

    // 流式运动指令
    StreamJointTorque = 0x40,
    StreamJointPosition = 0x41,
    StreamCartesianMotionForce = 0x42,

    // 数字 IO
    WriteDigitalOutput = 0x50,
    ReadDigitalInput = 0x51,
}

/// 非实时关节位置目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPositionTarget {
    pub positions: [f64; JOINT_DOF],
    pub velocities: [f64; JOINT_DOF],
    pub accelerations: [f64; JOINT_DOF],
    pub max_velocities: [f64; JOINT_DOF],
    pub max_accelerations: [f64; JOINT_DOF],
}

/// 实时关节位置流指令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointStreamTarget {
    pub positions: [f64; JOINT_DOF],
    pub velocities: [f64; JOINT_DOF],
    pub accelerations: [f64; JOINT_DOF],
}

/// 实时关节力矩流指令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTorqueTarget {
    pub torques: [f64; JOINT_DOF],
    /// 由控制器叠加重力补偿
    pub gravity_compensation: bool,
    /// 启用软限位保护
    pub soft_limits: bool,
}

/// 笛卡尔运动/力目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianTarget {
    pub pose: [f64; POSE_LEN],
    pub wrench: [f64; WRENCH_LEN],
}

/// 请求
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Enable,
    Stop,
    ClearFault,
    StartAutoRecovery,
    GetStatus,
    GetRobotInfo,
    SetMode(Mode),
    GetMode,
    SwitchTcp(u32),
    ExecutePlan(u32),
    ExecutePlanByName(String),
    PausePlan(bool),
    GetPlanNameList,
    GetPlanInfo,
    ExecutePrimitive(String),
    GetPrimitiveStates,
    SetGlobalVariables(GlobalVariables),
    GetGlobalVariables,
    SendJointPosition(JointPositionTarget),
    SendCartesianMotionForce(CartesianTarget),
    SetCartesianStiffness([f64; WRENCH_LEN]),
    SetNullSpacePosture([f64; JOINT_DOF]),
    StreamJointTorque(JointTorqueTarget),
    StreamJointPosition(JointStreamTarget),
    StreamCartesianMotionForce(CartesianTarget),
    WriteDigitalOutput { port: u8, value: bool },
    ReadDigitalInput(u8),
}

const CARTESIAN_MODES: &[Mode] = &[Mode::RtCartesianMotionForce, Mode::NrtCartesianMotionForce];

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Enable => Opcode::Enable,
            Self::Stop => Opcode::Stop,
            Self::ClearFault => Opcode::ClearFault,
            Self::StartAutoRecovery => Opcode::StartAutoRecovery,
            Self::GetStatus => Opcode::GetStatus,
            Self::GetRobotInfo => Opcode::GetRobotInfo,
            Self::SetMode(_) => Opcode::SetMode,
            Self::GetMode => Opcode::GetMode,
            Self::SwitchTcp(_) => Opcode::SwitchTcp,
            Self::ExecutePlan(_) => Opcode::ExecutePlan,
            Self::ExecutePlanByName(_) => Opcode::ExecutePlanByName,
            Self::PausePlan(_) => Opcode::PausePlan,
            Self::GetPlanNameList => Opcode::GetPlanNameList,
            Self::GetPlanInfo => Opcode::GetPlanInfo,
            Self::ExecutePrimitive(_) => Opcode::ExecutePrimitive,
            Self::GetPrimitiveStates => Opcode::GetPrimitiveStates,
            Self::SetGlobalVariables(_) => Opcode::SetGlobalVariables,
            Self::GetGlobalVariables => Opcode::GetGlobalVariables,
            Self::SendJointPosition(_) => Opcode::SendJointPosition,
            Self::SendCartesianMotionForce(_) => Opcode::SendCartesianMotionForce,
            Self::SetCartesianStiffness(_) => Opcode::SetCartesianStiffness,
            Self::SetNullSpacePosture(_) => Opcode::SetNullSpacePosture,
            Self::StreamJointTorque(_) => Opcode::StreamJointTorque,
            Self::StreamJointPosition(_) => Opcode::StreamJointPosition,
            Self::StreamCartesianMotionForce(_) => Opcode::StreamCartesianMotionForce,
            Self::WriteDigitalOutput { .. } => Opcode::WriteDigitalOutput,
            Self::ReadDigitalInput(_) => Opcode::ReadDigitalInput,
        }
    }

    /// 是否为流式请求（不应答）
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            Self::StreamJointTorque(_)
                | Self::StreamJointPosition(_)
                | Self::StreamCartesianMotionForce(_)
        )
    }

    /// 允许执行此请求的模式（空切片表示任意模式）
    pub fn required_modes(&self) -> &'static [Mode] {
        match self {
            Self::SendJointPosition(_) => &[Mode::NrtJointPosition],
            Self::SendCartesianMotionForce(_) => &[Mode::NrtCartesianMotionForce],
            Self::StreamJointTorque(_) => &[Mode::RtJointTorque],
            Self::StreamJointPosition(_) => &[Mode::RtJointPosition],
            Self::StreamCartesianMotionForce(_) => &[Mode::RtCartesianMotionForce],
            Self::SetCartesianStiffness(_) | Self::SetNullSpacePosture(_) => CARTESIAN_MODES,
            Self::ExecutePlan(_) | Self::ExecutePlanByName(_) | Self::PausePlan(_) => {
                &[Mode::NrtPlanExecution]
            },
            Self::ExecutePrimitive(_) => &[Mode::NrtPrimitiveExecution],
            _ => &[],
        }
    }

    /// 检查当前模式是否允许此请求
    pub fn allowed_in(&self, mode: Mode) -> bool {
        let required = self.required_modes();
        required.is_empty() || required.contains(&mode)
    }

    /// 编码（操作码 + 请求体）
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<(), ProtocolError> {
        buf.put_u8(self.opcode().into());
        match self {
            Self::SetMode(mode) => buf.put_u8(mode.as_u8()),
            Self::SwitchTcp(index) | Self::ExecutePlan(index) => buf.put_u32_le(*index),
            Self::ExecutePlanByName(name) | Self::ExecutePrimitive(name) => put_str(buf, name)?,
            Self::PausePlan(pause) => put_bool(buf, *pause),
            Self::SetGlobalVariables(vars) => vars.encode(buf)?,
            Self::SendJointPosition(target) => {
                put_f64_array(buf, &target.positions);
                put_f64_array(buf, &target.velocities);
                put_f64_array(buf, &target.accelerations);
                put_f64_array(buf, &target.max_velocities);
                put_f64_array(buf, &target.max_accelerations);
            },
            Self::SendCartesianMotionForce(target) | Self::StreamCartesianMotionForce(target) => {
                put_f64_array(buf, &target.pose);
                put_f64_array(buf, &target.wrench);
            },
            Self::SetCartesianStiffness(stiffness) => put_f64_array(buf, stiffness),
            Self::SetNullSpacePosture(posture) => put_f64_array(buf, posture),
            Self::StreamJointTorque(target) => {
                put_f64_array(buf, &target.torques);
                put_bool(buf, target.gravity_compensation);
                put_bool(buf, target.soft_limits);
            },
            Self::StreamJointPosition(target) => {
                put_f64_array(buf, &target.positions);
                put_f64_array(buf, &target.velocities);
                put_f64_array(buf, &target.accelerations);
            },
            Self::WriteDigitalOutput { port, value } => {
                buf.put_u8(*port);
                put_bool(buf, *value);
            },
            Self::ReadDigitalInput(port) => buf.put_u8(*port),
            Self::Enable
            | Self::Stop
            | Self::ClearFault
            | Self::StartAutoRecovery
            | Self::GetStatus
            | Self::GetRobotInfo
            | Self::GetMode
            | Self::GetPlanNameList
            | Self::GetPlanInfo
            | Self::GetPrimitiveStates
            | Self::GetGlobalVariables => {},
        }
        Ok(())
    }

    /// 解码（控制器侧使用）
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        let raw = get_u8(buf)?;
        let opcode = Opcode::try_from(raw).map_err(|_| ProtocolError::InvalidOpcode(raw))?;

        let request = match opcode {
            Opcode::Enable => Self::Enable,
            Opcode::Stop => Self::Stop,
            Opcode::ClearFault => Self::ClearFault,
            Opcode::StartAutoRecovery => Self::StartAutoRecovery,
            Opcode::GetStatus => Self::GetStatus,
            Opcode::GetRobotInfo => Self::GetRobotInfo,
            Opcode::SetMode => Self::SetMode(Mode::from(get_u8(buf)?)),
            Opcode::GetMode => Self::GetMode,
            Opcode::SwitchTcp => Self::SwitchTcp(get_u32(buf)?),
            Opcode::ExecutePlan => Self::ExecutePlan(get_u32(buf)?),
            Opcode::ExecutePlanByName => Self::ExecutePlanByName(get_str(buf)?),
            Opcode::PausePlan => Self::PausePlan(get_bool(buf, "pause")?),
            Opcode::GetPlanNameList => Self::GetPlanNameList,
            Opcode::GetPlanInfo => Self::GetPlanInfo,
            Opcode::ExecutePrimitive => Self::ExecutePrimitive(get_str(buf)?),
            Opcode::GetPrimitiveStates => Self::GetPrimitiveStates,
            Opcode::SetGlobalVariables => Self::SetGlobalVariables(GlobalVariables::decode(buf)?),
            Opcode::GetGlobalVariables => Self::GetGlobalVariables,
            Opcode::SendJointPosition => Self::SendJointPosition(JointPositionTarget {
                positions: get_f64_array(buf, "positions")?,
                velocities: get_f64_array(buf, "velocities")?,
                accelerations: get_f64_array(buf, "accelerations")?,
                max_velocities: get_f64_array(buf, "max_velocities")?,
                max_accelerations: get_f64_array(buf, "max_accelerations")?,
            }),
            Opcode::SendCartesianMotionForce => {
                Self::SendCartesianMotionForce(decode_cartesian(buf)?)
            },
            Opcode::SetCartesianStiffness => {
                Self::SetCartesianStiffness(get_f64_array(buf, "stiffness")?)
            },
            Opcode::SetNullSpacePosture => Self::SetNullSpacePosture(get_f64_array(buf, "posture")?),
            Opcode::StreamJointTorque => Self::StreamJointTorque(JointTorqueTarget {
                torques: get_f64_array(buf, "torques")?,
                gravity_compensation: get_bool(buf, "gravity_compensation")?,
                soft_limits: get_bool(buf, "soft_limits")?,
            }),
            Opcode::StreamJointPosition => Self::StreamJointPosition(JointStreamTarget {
                positions: get_f64_array(buf, "positions")?,
                velocities: get_f64_array(buf, "velocities")?,
                accelerations: get_f64_array(buf, "accelerations")?,
            }),
            Opcode::StreamCartesianMotionForce => {
                Self::StreamCartesianMotionForce(decode_cartesian(buf)?)
            },
            Opcode::WriteDigitalOutput => Self::WriteDigitalOutput {
                port: get_u8(buf)?,
                value: get_bool(buf, "value")?,
            },
            Opcode::ReadDigitalInput => Self::ReadDigitalInput(get_u8(buf)?),
        };

        if buf.has_remaining() {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after {:?}",
                buf.remaining(),
                opcode
            )));
        }
        Ok(request)
    }
}

fn decode_cartesian<B: Buf>(buf: &mut B) -> Result<CartesianTarget, ProtocolError> {
    Ok(CartesianTarget {
        pose: get_f64_array(buf, "pose")?,
        wrench: get_f64_array(buf, "wrench")?,
    })
}
