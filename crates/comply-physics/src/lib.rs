//! 物理模型：URDF 串联链运动学
//!
//! 启用 `kinematics` feature 后提供 [`UrdfKinematics`]，基于 `k` crate 实现
//! `comply_driver::Kinematics`（正运动学、几何雅可比、雅可比导数、数值逆解）。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! # #[cfg(feature = "kinematics")]
//! # {
//! use comply_physics::UrdfKinematics;
//! use comply_driver::Kinematics;
//!
//! let arm = UrdfKinematics::from_urdf_file("robot.urdf", "joint6").unwrap();
//! assert_eq!(arm.dof(), 6);
//! # }
//! ```

#[cfg(feature = "kinematics")]
mod urdf;

#[cfg(feature = "kinematics")]
pub use urdf::{IkParams, UrdfKinematics};
