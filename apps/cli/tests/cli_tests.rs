//! robot-states 端到端测试（模拟控制器运行在测试进程内，经 UDP 通信）

use assert_cmd::Command;
use predicates::prelude::*;
use rdk_transport::{MockConfig, MockController};
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

fn fast_config() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
connect_timeout_ms = 1000
request_timeout_ms = 300
disconnect_timeout_ms = 200

[readiness]
poll_interval_ms = 10
max_polls = 5
fault_clear_wait_ms = 20
"#
    )
    .unwrap();
    file
}

/// 隔离用户配置目录
fn robot_states(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("robot-states").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env("RUST_LOG", "info");
    cmd
}

fn spawn_controller(config: MockConfig) -> (MockController, String) {
    let controller = MockController::spawn_udp("127.0.0.1:0", config).unwrap();
    let address = controller.local_addr().unwrap().to_string();
    (controller, address)
}

#[test]
fn test_prints_states_once_when_operational() {
    let (_controller, address) = spawn_controller(MockConfig {
        operational_after_polls: Some(3),
        ..MockConfig::default()
    });
    let config = fast_config();
    let home = TempDir::new().unwrap();

    let output = robot_states(&home)
        .args([address.as_str(), "127.0.0.1", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Robot is now operational"))
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    assert_eq!(stdout.matches("Current robot states").count(), 1);
    assert!(stdout.lines().any(|line| line.starts_with("q: [")));
    assert!(stdout.lines().any(|line| line.starts_with("ext_wrench_in_base: [")));
}

#[test]
fn test_json_output() {
    let (_controller, address) = spawn_controller(MockConfig::default());
    let config = fast_config();
    let home = TempDir::new().unwrap();

    let output = robot_states(&home)
        .args([address.as_str(), "127.0.0.1", "--json", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["q"].as_array().unwrap().len(), 7);
    assert_eq!(value["status"]["operational"], true);
    assert!(value["cycle"].as_u64().unwrap() > 0);
}

#[test]
fn test_clearable_fault_then_operational() {
    let (controller, address) = spawn_controller(MockConfig {
        fault: true,
        fault_clearable: true,
        ..MockConfig::default()
    });
    let config = fast_config();
    let home = TempDir::new().unwrap();

    robot_states(&home)
        .args([address.as_str(), "127.0.0.1", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Fault on robot server is cleared"))
        .stdout(predicate::str::contains("Current robot states"));

    assert!(!controller.is_fault());
}

#[test]
fn test_unclearable_fault_exits_with_1() {
    let (_controller, address) = spawn_controller(MockConfig {
        fault: true,
        fault_clearable: false,
        ..MockConfig::default()
    });
    let config = fast_config();
    let home = TempDir::new().unwrap();

    robot_states(&home)
        .args([address.as_str(), "127.0.0.1", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("fault cannot be cleared"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_never_operational_warns_and_exits_cleanly() {
    let (_controller, address) = spawn_controller(MockConfig {
        operational_after_polls: None,
        ..MockConfig::default()
    });
    let config = fast_config();
    let home = TempDir::new().unwrap();

    robot_states(&home)
        .args([address.as_str(), "127.0.0.1", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Still waiting for robot to become operational"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_operational_without_state_feed_prints_nothing() {
    let (_controller, address) = spawn_controller(MockConfig {
        feed_interval: Duration::from_secs(3600),
        ..MockConfig::default()
    });
    let mut config = NamedTempFile::new().unwrap();
    write!(
        config,
        r#"
request_timeout_ms = 300
connection_timeout_ms = 200

[readiness]
poll_interval_ms = 10
max_polls = 5
"#
    )
    .unwrap();
    let home = TempDir::new().unwrap();

    robot_states(&home)
        .args([address.as_str(), "127.0.0.1", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Robot is now operational"))
        .stderr(predicate::str::contains("No state feed received within 200 ms"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unreachable_controller_exits_with_1() {
    let port = std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = fast_config();
    let home = TempDir::new().unwrap();

    robot_states(&home)
        .args([format!("127.0.0.1:{port}").as_str(), "127.0.0.1", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to connect"));
}

#[test]
fn test_invalid_config_exits_with_1() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[readiness]\nmax_polls = 0").unwrap();
    let home = TempDir::new().unwrap();

    robot_states(&home)
        .args(["127.0.0.1", "127.0.0.1", "--config"])
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_user_config_dir_is_used() {
    let (_controller, address) = spawn_controller(MockConfig {
        operational_after_polls: None,
        ..MockConfig::default()
    });
    let home = TempDir::new().unwrap();
    let dir = home.path().join("rdk");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "request_timeout_ms = 300\n[readiness]\npoll_interval_ms = 5\nmax_polls = 2\n",
    )
    .unwrap();

    // 只有读到了用户配置才会在 2 次轮询（约 10ms）后放弃
    robot_states(&home)
        .args([address.as_str(), "127.0.0.1"])
        .timeout(Duration::from_secs(5))
        .assert()
        .success()
        .stderr(predicate::str::contains("after 10 ms"));
}

#[test]
fn test_missing_arguments_exit_with_2() {
    let home = TempDir::new().unwrap();
    robot_states(&home)
        .arg("192.168.2.100")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("LOCAL_ADDRESS"));
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    robot_states(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--config"));
}
