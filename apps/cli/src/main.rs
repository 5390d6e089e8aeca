//! # robot-states
//!
//! 连接控制器，必要时清除故障，使能并等待就绪，然后打印一次当前状态。
//!
//! ```bash
//! robot-states 192.168.2.100 192.168.2.35
//! robot-states 192.168.2.100 192.168.2.35 --json
//! robot-states 192.168.2.100 192.168.2.35 --config ./rdk.toml
//! ```
//!
//! 退出码：0 正常结束（包括等待就绪超时），1 连接失败或故障无法清除，
//! 2 参数错误。

use anyhow::{Context, Result};
use clap::Parser;
use rdk_sdk::prelude::{RecoveryOutcome, RobotError, RobotSession, SystemClock};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod report;

use report::StateReport;

/// RDK 状态查看工具
#[derive(Parser, Debug)]
#[command(name = "robot-states")]
#[command(about = "Enable an RDK robot and print its current states", long_about = None)]
#[command(version)]
struct Cli {
    /// 控制器地址（如 192.168.2.100 或 192.168.2.100:8888）
    robot_address: String,

    /// 本机网卡地址（如 192.168.2.35）
    local_address: String,

    /// 配置文件（TOML），缺省时读取用户配置目录下的 rdk/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 以 JSON 输出状态
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        },
    }
}

/// 日志写到 stderr，stdout 只留给状态输出
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let session_config = config::resolve(cli.config.as_deref())?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Release)) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    info!("Connecting to {} from {}", cli.robot_address, cli.local_address);
    let mut session =
        RobotSession::connect_with_config(&cli.robot_address, &cli.local_address, session_config)
            .with_context(|| format!("failed to connect to {}", cli.robot_address))?;

    let clock = SystemClock::new();

    // 故障只尝试清除一次
    match session.recover_fault(&clock) {
        Ok(RecoveryOutcome::NoFault) => {},
        Ok(RecoveryOutcome::Cleared) => info!("Fault on robot server is cleared"),
        Err(e) => {
            session.disconnect();
            return Err(anyhow::Error::new(e).context("fault cannot be cleared"));
        },
    }

    info!("Enabling robot ...");
    let result = session.enable_and_wait(&clock, Some(&*cancel));
    match result {
        Ok(()) => {
            info!("Robot is now operational");
            // 状态查询走请求通道，可操作时不一定已经收到状态推送
            match session.wait_for_first_state(session.config().connection_timeout()) {
                Ok(snapshot) => print_report(&StateReport::from_snapshot(&snapshot), cli.json)?,
                Err(RobotError::Timeout { timeout_ms }) => warn!(
                    "No state feed received within {} ms, robot states not printed",
                    timeout_ms
                ),
                Err(e) => {
                    session.disconnect();
                    return Err(anyhow::Error::new(e).context("failed to read robot states"));
                },
            }
        },
        Err(RobotError::Timeout { timeout_ms }) => {
            warn!(
                "Still waiting for robot to become operational after {} ms, please check the robot",
                timeout_ms
            );
        },
        Err(RobotError::Cancelled) => warn!("Interrupted before the robot became operational"),
        Err(e) => {
            session.disconnect();
            return Err(anyhow::Error::new(e).context("failed to enable robot"));
        },
    }

    session.disconnect();
    Ok(())
}

fn print_report(report: &StateReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
