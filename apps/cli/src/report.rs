//! 状态输出

use rdk_sdk::prelude::RobotStateSnapshot;
use serde::Serialize;
use std::fmt;

/// 状态位（JSON 输出用）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusReport {
    pub operational: bool,
    pub busy: bool,
    pub fault: bool,
    pub estop_released: bool,
    pub recovery_state: bool,
    pub stopped: bool,
}

/// 一帧状态的可序列化视图
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub cycle: u64,
    pub timestamp_us: u64,
    pub status: StatusReport,
    pub q: Vec<f64>,
    pub theta: Vec<f64>,
    pub dq: Vec<f64>,
    pub dtheta: Vec<f64>,
    pub tau: Vec<f64>,
    pub tau_des: Vec<f64>,
    pub tau_dot: Vec<f64>,
    pub tau_ext: Vec<f64>,
    pub tcp_pose: Vec<f64>,
    pub tcp_pose_des: Vec<f64>,
    pub tcp_vel: Vec<f64>,
    pub cam_pose: Vec<f64>,
    pub flange_pose: Vec<f64>,
    pub ft_sensor_raw: Vec<f64>,
    pub ext_wrench_in_tcp: Vec<f64>,
    pub ext_wrench_in_base: Vec<f64>,
}

impl StateReport {
    pub fn from_snapshot(snapshot: &RobotStateSnapshot) -> Self {
        let status = snapshot.status;
        let s = &snapshot.states;
        Self {
            cycle: snapshot.cycle,
            timestamp_us: snapshot.timestamp_us,
            status: StatusReport {
                operational: status.operational(),
                busy: status.busy(),
                fault: status.fault(),
                estop_released: status.estop_released(),
                recovery_state: status.recovery_state(),
                stopped: status.stopped(),
            },
            q: s.q.to_vec(),
            theta: s.theta.to_vec(),
            dq: s.dq.to_vec(),
            dtheta: s.dtheta.to_vec(),
            tau: s.tau.to_vec(),
            tau_des: s.tau_des.to_vec(),
            tau_dot: s.tau_dot.to_vec(),
            tau_ext: s.tau_ext.to_vec(),
            tcp_pose: s.tcp_pose.to_vec(),
            tcp_pose_des: s.tcp_pose_des.to_vec(),
            tcp_vel: s.tcp_vel.to_vec(),
            cam_pose: s.cam_pose.to_vec(),
            flange_pose: s.flange_pose.to_vec(),
            ft_sensor_raw: s.ft_sensor_raw.to_vec(),
            ext_wrench_in_tcp: s.ext_wrench_in_tcp.to_vec(),
            ext_wrench_in_base: s.ext_wrench_in_base.to_vec(),
        }
    }

    fn rows(&self) -> [(&'static str, &[f64]); 16] {
        [
            ("q", &self.q[..]),
            ("theta", &self.theta[..]),
            ("dq", &self.dq[..]),
            ("dtheta", &self.dtheta[..]),
            ("tau", &self.tau[..]),
            ("tau_des", &self.tau_des[..]),
            ("tau_dot", &self.tau_dot[..]),
            ("tau_ext", &self.tau_ext[..]),
            ("tcp_pose", &self.tcp_pose[..]),
            ("tcp_pose_des", &self.tcp_pose_des[..]),
            ("tcp_vel", &self.tcp_vel[..]),
            ("cam_pose", &self.cam_pose[..]),
            ("flange_pose", &self.flange_pose[..]),
            ("ft_sensor_raw", &self.ft_sensor_raw[..]),
            ("ext_wrench_in_tcp", &self.ext_wrench_in_tcp[..]),
            ("ext_wrench_in_base", &self.ext_wrench_in_base[..]),
        ]
    }
}

impl fmt::Display for StateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current robot states (cycle {}):", self.cycle)?;
        for (name, values) in self.rows() {
            write!(f, "{name}: [")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v:.4}")?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
