//! 配置管理命令

use anyhow::{Context, Result};
use clap::Subcommand;
use comply_sdk::ControllerConfig;
use std::path::{Path, PathBuf};

/// 加载配置文件，未指定时返回默认配置
pub fn load_or_default(path: Option<&Path>) -> Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ControllerConfig::default()),
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 以 TOML 打印配置（未指定文件时为默认配置）
    Show {
        /// 配置文件路径
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// 解析并校验配置文件
    Check {
        /// 配置文件路径
        path: PathBuf,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { path } => {
                let config = load_or_default(path.as_deref())?;
                print!("{}", config.to_toml_string()?);
                Ok(())
            },
            ConfigCommand::Check { path } => {
                let config = load_or_default(Some(&path))?;
                let l = &config.control_loop;
                println!("✅ {} is valid", path.display());
                println!(
                    "   control period {:.1} ms, tank [{}, {}] J, ramp {} s",
                    l.sample_time * 1000.0,
                    config.tank.min_energy,
                    config.tank.max_energy,
                    config.impedance.ramp_time
                );
                Ok(())
            },
        }
    }
}
