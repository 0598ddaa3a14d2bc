//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use comply_sdk::prelude::*;
//! ```

// 客户端层（推荐入口）
pub use crate::client::{
    BoundaryConditions, DispatchError, TrajectoryDispatcher, TrajectoryHandle, TrajectoryRequest,
    TrajectoryResult,
};

// 驱动层
pub use crate::driver::{
    CartesianKinematics, ChannelHook, ControlCallback, Controller, ControllerBuilder, Diagnostics,
    DriverError, JointCommand, Kinematics,
};

// 配置与值类型
pub use crate::control::types::*;
pub use crate::control::{ConfigError, ContactState, ContactTransition, ControllerConfig};

#[cfg(feature = "kinematics")]
pub use crate::physics::UrdfKinematics;
