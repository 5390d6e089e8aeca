//! 顶层导出测试：通过 facade 完成一次完整会话

use rdk_sdk::prelude::*;
use rdk_sdk::transport::{MockConfig, MockController};
use std::time::Duration;

#[test]
fn test_prelude_session_roundtrip() {
    rdk_sdk::init_logger();

    let (_controller, transport) = MockController::spawn(MockConfig::default());
    let config = SessionConfig {
        request_timeout_ms: 300,
        disconnect_timeout_ms: 200,
        ..SessionConfig::default()
    };
    let mut session = RobotSession::connect_with_transport(transport, config).unwrap();

    let clock = rdk_sdk::client::ManualClock::new();
    session.enable_and_wait(&clock, None).unwrap();
    let state = session.wait_for_first_state(Duration::from_secs(1)).unwrap();
    assert!(state.is_valid());
    assert_eq!(session.current_mode(), Mode::Idle);

    session.disconnect();
    assert!(matches!(session.enable(), Err(RobotError::InvalidSession)));
}

#[test]
fn test_error_types_are_exported() {
    let err: rdk_sdk::DriverError = rdk_sdk::TransportError::Timeout.into();
    assert_eq!(err.to_string(), "Transport error: Read timeout");
    let _: Option<rdk_sdk::Driver> = None;
}
