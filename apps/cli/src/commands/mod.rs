//! 命令模块

pub mod config;
pub mod plan;
pub mod simulate;

pub use config::ConfigCommand;
pub use plan::PlanCommand;
pub use simulate::SimulateCommand;
