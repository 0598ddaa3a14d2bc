//! 驱动层：固定周期控制线程与传感器状态同步
//!
//! 本 crate 把 `comply-core` 的纯计算组件放进一个长期运行的控制线程：
//! - 传感器接入（正运动学、力传感器去偏置与滤波）（[`sensors`]）
//! - 状态同步（ArcSwap 无锁读取 + Condvar 带超时握手）（[`state`]、[`signal`]、[`slot`]）
//! - 控制循环（[`pipeline`]）
//! - 钩子系统：发布关节命令、诊断量与接触状态迁移（[`hooks`]）
//! - 性能指标（[`metrics`]）
//!
//! 运动学模型通过 [`Kinematics`] trait 注入。
//!
//! # 使用示例
//!
//! ```rust
//! use comply_driver::{ControllerBuilder, kinematics::CartesianKinematics};
//! use comply_core::ControllerConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut config = ControllerConfig::default();
//! config.control_loop.require_wrench = false;
//! let controller = ControllerBuilder::new(Arc::new(CartesianKinematics::new()))
//!     .config(config)
//!     .build()
//!     .unwrap();
//!
//! controller
//!     .sensors()
//!     .on_joint_state(&[0.3, 0.0, 0.3, 0.0, 0.0, 0.0], &[0.0; 6])
//!     .unwrap();
//! controller.wait_until_ready(Duration::from_secs(1)).unwrap();
//! ```

mod builder;
pub mod command;
mod controller;
mod error;
pub mod hooks;
pub mod kinematics;
pub mod metrics;
pub mod pipeline;
pub mod sensors;
pub mod signal;
pub mod slot;
pub mod state;

pub use builder::ControllerBuilder;
pub use command::{Diagnostics, JointCommand};
pub use controller::Controller;
pub use error::{DriverError, KinematicsError};
pub use hooks::{ChannelHook, ControlCallback, HookManager, HookReceivers};
pub use kinematics::{CartesianKinematics, ForwardKinematics, JointVector, Kinematics};
pub use metrics::{ControlMetrics, MetricsSnapshot};
pub use pipeline::{ControlCore, TickInputs, TickOutput, control_loop};
pub use sensors::{ForceTorqueStatus, SensorInput};
pub use signal::DataSignal;
pub use slot::SetpointSlot;
pub use state::*;
