//! 柔顺控制核心算法层
//!
//! 本 crate 只包含纯计算组件，不涉及线程、通道或 IO：
//! - 单极点低通滤波器与数值微分器（[`filter`]）
//! - 能量罐（Energy Tank），约束变阻抗参数注入的能量（[`tank`]）
//! - 任务空间阻抗模型（虚拟质量-弹簧-阻尼器）（[`impedance`]）
//! - 阻抗参数调度器，按接触状态在名义值与目标值之间限速渐变（[`scheduler`]）
//! - 接触状态机（FREE / HOOKED / DETACHED / IMPACT），带去抖（[`contact`]）
//! - 力跟踪律（混合力/位置控制）（[`force`]）
//! - 控制器配置（TOML）（[`config`]）
//!
//! 线程模型与传感器同步见 `comply-driver`。

pub mod config;
pub mod contact;
mod error;
pub mod filter;
pub mod force;
pub mod impedance;
pub mod math;
pub mod scheduler;
pub mod tank;
pub mod types;

pub use config::{
    AxisLimit, ContactConfig, ControllerConfig, CorrectionConfig, ForceConfig, GainProfile,
    ImpedanceConfig, LoopConfig, TankConfig, WorkspaceLimits,
};
pub use contact::{
    ContactInputs, ContactState, ContactStateMachine, ContactThresholds, ContactTransition,
};
pub use error::ConfigError;
pub use filter::{ChannelFilter, Differentiator, LowPassFilter};
pub use force::ForceTrackingLaw;
pub use impedance::{ImpedanceDiagnostics, ImpedanceModel, ImpedanceParams};
pub use scheduler::{GainScheduler, ProfileTable};
pub use tank::EnergyTank;
pub use types::*;
