//! 控制模式定义
//!
//! 控制器当前所处的模式决定哪些指令合法。模式分为两类：
//!
//! - **RT（实时流式）**：调用方必须以控制器实时周期持续发送指令
//! - **NRT（非实时离散）**：一次性目标更新，由控制器插值

/// 控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, num_enum::FromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Mode {
    /// 未知（无效线值也解析为此值）
    #[default]
    Unknown = 0,
    /// 空闲
    Idle = 1,
    /// 实时关节力矩流
    RtJointTorque = 2,
    /// 实时关节位置流
    RtJointPosition = 3,
    /// 非实时关节位置
    NrtJointPosition = 4,
    /// 非实时任务执行
    NrtPlanExecution = 5,
    /// 非实时原语执行
    NrtPrimitiveExecution = 6,
    /// 实时笛卡尔运动/力流
    RtCartesianMotionForce = 7,
    /// 非实时笛卡尔运动/力
    NrtCartesianMotionForce = 8,
}

impl Mode {
    /// 转换为线值
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否为实时（流式）模式
    pub fn is_realtime(self) -> bool {
        matches!(
            self,
            Self::RtJointTorque | Self::RtJointPosition | Self::RtCartesianMotionForce
        )
    }

    /// 是否为非实时（离散）模式
    pub fn is_non_realtime(self) -> bool {
        matches!(
            self,
            Self::NrtJointPosition
                | Self::NrtPlanExecution
                | Self::NrtPrimitiveExecution
                | Self::NrtCartesianMotionForce
        )
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "UNKNOWN",
            Self::Idle => "IDLE",
            Self::RtJointTorque => "RT_JOINT_TORQUE",
            Self::RtJointPosition => "RT_JOINT_POSITION",
            Self::NrtJointPosition => "NRT_JOINT_POSITION",
            Self::NrtPlanExecution => "NRT_PLAN_EXECUTION",
            Self::NrtPrimitiveExecution => "NRT_PRIMITIVE_EXECUTION",
            Self::RtCartesianMotionForce => "RT_CARTESIAN_MOTION_FORCE",
            Self::NrtCartesianMotionForce => "NRT_CARTESIAN_MOTION_FORCE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(Mode::from(1u8), Mode::Idle);
        assert_eq!(Mode::from(7u8), Mode::RtCartesianMotionForce);
        assert_eq!(Mode::from(200u8), Mode::Unknown); // 无效值
    }

    #[test]
    fn test_mode_classes_are_disjoint() {
        for raw in 0..=8u8 {
            let mode = Mode::from(raw);
            assert!(
                !(mode.is_realtime() && mode.is_non_realtime()),
                "{mode} is in both classes"
            );
        }
        assert!(!Mode::Idle.is_realtime());
        assert!(!Mode::Idle.is_non_realtime());
        assert!(Mode::RtJointTorque.is_realtime());
        assert!(Mode::NrtPlanExecution.is_non_realtime());
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::NrtJointPosition.to_string(), "NRT_JOINT_POSITION");
    }
}
