//! # Comply CLI
//!
//! 柔顺控制器的命令行工具：配置管理、轨迹预览与闭环仿真。
//!
//! ```bash
//! # 打印默认配置
//! comply-cli config show > controller.toml
//!
//! # 校验配置文件
//! comply-cli config check controller.toml
//!
//! # 预览一段直线轨迹（JSON 行）
//! comply-cli plan --to 0.4,0.1,0.3 --duration 2
//!
//! # 以脚本化接触力运行仿真，观察接触状态迁移与阻抗渐变
//! comply-cli simulate --config controller.toml --duration 20
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, PlanCommand, SimulateCommand};

/// Comply CLI - 变阻抗柔顺控制命令行工具
#[derive(Parser, Debug)]
#[command(name = "comply-cli")]
#[command(about = "Command-line interface for the compliant controller", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 插值并打印轨迹设定点
    Plan {
        #[command(flatten)]
        args: PlanCommand,
    },

    /// 运行闭环仿真
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("comply_cli=info".parse()?)
                .add_directive("comply_driver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Plan { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
    }
}
