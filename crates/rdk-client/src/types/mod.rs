//! 客户端类型
//!
//! 错误类型与会话层使用的协议类型重新导出。

pub mod error;

pub use error::{Result, RobotError};
pub use rdk_protocol::{
    CartesianTarget, ErrorCode, GlobalVariables, JOINT_DOF, JointPositionTarget,
    JointStreamTarget, JointTorqueTarget, Mode, POSE_LEN, PlanInfo, PrimitiveStates, RobotInfo,
    RobotStates, StatusFlags, TWIST_LEN, WRENCH_LEN,
};
pub use rdk_driver::RobotStateSnapshot;
