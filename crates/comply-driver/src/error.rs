//! 驱动层错误类型定义

use comply_core::ConfigError;
use thiserror::Error;

/// 运动学求解错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// 逆运动学未收敛
    #[error("Inverse kinematics did not converge")]
    Unsolved,

    /// 关节向量维度不匹配
    #[error("Joint vector has {actual} entries, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 运动学模型错误（加载、查找连杆等）
    #[error("Kinematic model error: {0}")]
    Model(String),
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 配置非法
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// 运动学错误
    #[error("Kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),

    /// 控制线程启动失败
    #[error("Failed to spawn control thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// 控制循环已停止
    #[error("Control loop is not running")]
    NotRunning,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
