//! 任务与原语执行
//!
//! 执行指令只负责启动，没有完成回调；完成情况通过 `is_busy` 或
//! `get_plan_info` / `get_primitive_states` 轮询得到。

use crate::readiness::Clock;
use crate::session::{RobotSession, decode_payload};
use crate::types::{Result, RobotError};
use rdk_protocol::codec::get_str_list;
use rdk_protocol::{GlobalVariables, PlanInfo, PrimitiveStates, Request};
use std::time::Duration;
use tracing::{debug, info};

impl RobotSession {
    /// 按索引执行任务（需要 `NrtPlanExecution`）
    pub fn execute_plan(&self, index: u32) -> Result<()> {
        let request = Request::ExecutePlan(index);
        self.ensure_mode(&request)?;
        self.request(&request)?;
        info!("Plan #{} started", index);
        Ok(())
    }

    /// 按名称执行任务（需要 `NrtPlanExecution`）
    pub fn execute_plan_by_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(RobotError::InvalidInput("plan name is empty".to_string()));
        }
        let request = Request::ExecutePlanByName(name.to_string());
        self.ensure_mode(&request)?;
        self.request(&request)?;
        info!("Plan {:?} started", name);
        Ok(())
    }

    /// 暂停（`true`）或继续（`false`）当前任务
    pub fn pause_plan(&self, pause: bool) -> Result<()> {
        let request = Request::PausePlan(pause);
        self.ensure_mode(&request)?;
        self.request(&request)?;
        Ok(())
    }

    pub fn get_plan_name_list(&self) -> Result<Vec<String>> {
        let payload = self.request(&Request::GetPlanNameList)?;
        decode_payload(payload, get_str_list)
    }

    /// 当前任务信息（每次实时查询）
    pub fn get_plan_info(&self) -> Result<PlanInfo> {
        let payload = self.request(&Request::GetPlanInfo)?;
        decode_payload(payload, |buf| PlanInfo::decode(buf))
    }

    /// 执行原语（需要 `NrtPrimitiveExecution`），如 `"MoveJ(target=0 0 0 0 0 0 0)"`
    pub fn execute_primitive(&self, command: &str) -> Result<()> {
        if command.trim().is_empty() {
            return Err(RobotError::InvalidInput("primitive command is empty".to_string()));
        }
        let request = Request::ExecutePrimitive(command.to_string());
        self.ensure_mode(&request)?;
        self.request(&request)?;
        info!("Primitive {:?} started", command);
        Ok(())
    }

    pub fn get_primitive_states(&self) -> Result<PrimitiveStates> {
        let payload = self.request(&Request::GetPrimitiveStates)?;
        decode_payload(payload, |buf| PrimitiveStates::decode(buf))
    }

    pub fn set_global_variables(&self, variables: &GlobalVariables) -> Result<()> {
        self.request(&Request::SetGlobalVariables(variables.clone()))?;
        Ok(())
    }

    pub fn get_global_variables(&self) -> Result<GlobalVariables> {
        let payload = self.request(&Request::GetGlobalVariables)?;
        decode_payload(payload, |buf| GlobalVariables::decode(buf))
    }

    /// 按 `poll_interval` 轮询 `is_busy`，直到空闲
    ///
    /// # 错误
    /// - `RobotError::Timeout`: `max_polls` 次轮询后仍然忙
    pub fn wait_while_busy(
        &self,
        clock: &dyn Clock,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Result<()> {
        self.driver()?;
        for poll in 1..=max_polls {
            clock.sleep(poll_interval);
            if !self.is_busy() {
                debug!("Robot idle after {} polls", poll);
                return Ok(());
            }
        }
        Err(RobotError::Timeout {
            timeout_ms: poll_interval
                .checked_mul(max_polls)
                .map_or(u64::MAX, |total| total.as_millis() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::readiness::ManualClock;
    use rdk_protocol::{ErrorCode, Mode};
    use rdk_transport::{MockConfig, MockController};

    fn operational_session() -> (MockController, RobotSession) {
        let (controller, transport) = MockController::spawn(MockConfig::default());
        let config = SessionConfig {
            request_timeout_ms: 300,
            ..SessionConfig::default()
        };
        let session = RobotSession::connect_with_transport(transport, config).unwrap();
        session.enable_and_wait(&ManualClock::new(), None).unwrap();
        (controller, session)
    }

    #[test]
    fn test_plan_requires_plan_mode() {
        let (_controller, session) = operational_session();
        assert!(matches!(
            session.execute_plan(0),
            Err(RobotError::InvalidMode { .. })
        ));
    }

    #[test]
    fn test_execute_plan_and_wait() {
        let (_controller, session) = operational_session();
        assert_eq!(
            session.get_plan_name_list().unwrap(),
            vec!["PLAN-Home".to_string(), "PLAN-PickPlace".to_string()]
        );

        session.set_mode(Mode::NrtPlanExecution).unwrap();
        session.execute_plan_by_name("PLAN-PickPlace").unwrap();
        assert_eq!(
            session.get_plan_info().unwrap().assigned_plan_name,
            "PLAN-PickPlace"
        );

        let clock = ManualClock::new();
        session
            .wait_while_busy(&clock, Duration::from_millis(100), 10)
            .unwrap();
        assert!(!session.is_busy());
    }

    #[test]
    fn test_unknown_plan_is_not_found() {
        let (_controller, session) = operational_session();
        session.set_mode(Mode::NrtPlanExecution).unwrap();
        match session.execute_plan(9).unwrap_err() {
            RobotError::Rejected { code, .. } => assert_eq!(code, ErrorCode::NotFound),
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_primitive_states() {
        let (_controller, session) = operational_session();
        session.set_mode(Mode::NrtPrimitiveExecution).unwrap();
        session.execute_primitive("Home()").unwrap();

        let states = session.get_primitive_states().unwrap();
        assert_eq!(states.get("primitiveName"), Some("Home"));
        assert!(matches!(
            session.execute_primitive("  "),
            Err(RobotError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_global_variables() {
        let (controller, session) = operational_session();
        let vars = GlobalVariables::new()
            .with("speed", "0.5")
            .with("target", "0 0 0 0 0 0 0");
        session.set_global_variables(&vars).unwrap();

        let read = session.get_global_variables().unwrap();
        assert_eq!(read.get("speed"), Some("0.5"));
        assert_eq!(controller.global_variables(), read);
    }
}
