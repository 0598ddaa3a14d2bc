//! 控制线程输出：关节命令与诊断量

use crate::kinematics::JointVector;
use comply_core::{ContactState, ImpedanceParams};

/// 每 tick 发布一次的关节位置命令
#[derive(Debug, Clone, PartialEq)]
pub struct JointCommand {
    /// tick 序号
    pub tick: u64,
    /// N 个关节的位置命令
    pub positions: JointVector,
    /// 逆解失败、沿用上一拍命令时为 `true`
    pub held: bool,
}

/// 每 tick 发布一次的诊断量（只供外部观察，不回读）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub tick: u64,
    /// 阻抗模型存储能量
    pub admittance_energy: f64,
    /// 累计外力做功
    pub extracted_energy: f64,
    /// 瞬时净接触功率；本 tick 力读数无效时为 `None`
    pub contact_power: Option<f64>,
    /// 能量罐储能
    pub tank_energy: f64,
    /// 能量罐门控系数
    pub tank_alpha: f64,
    /// 当前对角阻抗参数
    pub gains: ImpedanceParams,
    pub contact_state: ContactState,
    /// 是否处于力控模式
    pub force_mode: bool,
}
