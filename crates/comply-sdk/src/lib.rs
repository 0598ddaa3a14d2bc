//! Comply SDK - 被动性约束的变阻抗柔顺控制
//!
//! 面向机械臂的任务空间变阻抗控制器：接触状态机驱动阻抗参数调度，
//! 能量罐保证参数变化不向系统注入超出储能的能量。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **算法层** (`control`): 滤波、能量罐、阻抗模型、调度器、接触状态机、力跟踪律
//! - **驱动层** (`driver`): 控制线程、传感器输入、设定点槽、回调与指标
//! - **客户端层** (`client`): 轨迹请求、插值与分发
//! - **物理层** (`physics`，需 `kinematics` feature): 基于 URDF 的运动学
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use comply_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! comply_sdk::init_logger().ok();
//!
//! let controller = ControllerBuilder::new(Arc::new(CartesianKinematics::new()))
//!     .config(ControllerConfig::default())
//!     .build()
//!     .unwrap();
//! let dispatcher = TrajectoryDispatcher::new(&controller);
//! let handle = dispatcher
//!     .submit(TrajectoryRequest::move_to(
//!         controller.desired_pose(),
//!         Pose::from_translation(0.3, 0.0, 0.2),
//!         2.0,
//!     ))
//!     .unwrap();
//! let result = handle.wait().unwrap();
//! assert!(result.ok);
//! ```

mod logging;
pub mod prelude;

pub use comply_client as client;
pub use comply_core as control;
pub use comply_driver as driver;
#[cfg(feature = "kinematics")]
pub use comply_physics as physics;

pub use logging::{LoggerError, init_logger, init_logger_with_filter};

// 算法层常用类型
pub use comply_core::{
    AxisMask, ConfigError, ContactState, ContactTransition, ControllerConfig, Pose, Setpoint,
    Twist, Wrench,
};

// 驱动层
pub use comply_driver::{
    CartesianKinematics, Controller, ControllerBuilder, Diagnostics, DriverError, JointCommand,
    Kinematics,
};

// 客户端层
pub use comply_client::{
    DispatchError, PlanError, TrajectoryDispatcher, TrajectoryHandle, TrajectoryRequest,
    TrajectoryResult,
};

#[cfg(feature = "kinematics")]
pub use comply_physics::UrdfKinematics;
