//! 客户端接口：轨迹请求、插值与分发
//!
//! - [`request`]：位置/力轨迹请求与校验
//! - [`planner`]：笛卡尔与力旋量插值器（Iterator 模式）
//! - [`dispatcher`]：一次一条的轨迹分发器，支持完成百分比反馈与取消
//!
//! 分发器通过 `comply-driver` 的设定点槽向控制线程供点。

pub mod dispatcher;
pub mod planner;
pub mod request;

pub use dispatcher::{DispatchError, TrajectoryDispatcher, TrajectoryHandle, TrajectoryResult};
pub use planner::{CartesianPlanner, SetpointStream, WrenchPlanner, plan};
pub use request::{BoundaryConditions, PlanError, TrajectoryRequest};
