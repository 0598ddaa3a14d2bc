//! 任务空间基础类型
//!
//! 所有 6 维量按 `[线性(3), 角(3)]` 排列，与 [`Vector6`] 互转。

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// 6 维实向量（任务空间）
pub type Vector6 = nalgebra::Vector6<f64>;

/// 6×6 实矩阵
pub type Matrix6 = nalgebra::Matrix6<f64>;

/// 末端位姿：位置 + 单位四元数姿态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// 单位位姿（原点，无旋转）
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// 仅平移的位姿
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// 姿态旋转矩阵
    pub fn rotation(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// 末端速度（线速度 + 角速度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// 末端加速度（线加速度 + 角加速度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Accel {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// 力旋量（力 + 力矩）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
}

fn split(v: &Vector6) -> (Vector3<f64>, Vector3<f64>) {
    (v.fixed_rows::<3>(0).into_owned(), v.fixed_rows::<3>(3).into_owned())
}

fn join(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector6 {
    Vector6::new(a.x, a.y, a.z, b.x, b.y, b.z)
}

impl Twist {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn from_vector(v: &Vector6) -> Self {
        let (linear, angular) = split(v);
        Self { linear, angular }
    }

    pub fn to_vector(&self) -> Vector6 {
        join(&self.linear, &self.angular)
    }
}

impl Accel {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn from_vector(v: &Vector6) -> Self {
        let (linear, angular) = split(v);
        Self { linear, angular }
    }

    pub fn to_vector(&self) -> Vector6 {
        join(&self.linear, &self.angular)
    }
}

impl Wrench {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn new(force: Vector3<f64>, torque: Vector3<f64>) -> Self {
        Self { force, torque }
    }

    pub fn from_vector(v: &Vector6) -> Self {
        let (force, torque) = split(v);
        Self { force, torque }
    }

    pub fn to_vector(&self) -> Vector6 {
        join(&self.force, &self.torque)
    }

    /// 6 维欧氏范数
    pub fn norm(&self) -> f64 {
        self.to_vector().norm()
    }

    pub fn is_finite(&self) -> bool {
        self.force.iter().chain(self.torque.iter()).all(|v| v.is_finite())
    }

    /// 用旋转矩阵将力与力矩旋转到另一坐标系
    pub fn rotated(&self, rotation: &Matrix3<f64>) -> Self {
        Self::new(rotation * self.force, rotation * self.torque)
    }
}

impl std::ops::Add for Wrench {
    type Output = Wrench;

    fn add(self, rhs: Wrench) -> Wrench {
        Wrench::new(self.force + rhs.force, self.torque + rhs.torque)
    }
}

/// 本 tick 的接触力读数
///
/// 区分"尚未收到任何有效样本"（柔顺冻结）与"本 tick 读数异常"（按零力处理）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WrenchReading {
    /// 尚未收到有效样本
    NotYetReceived,
    /// 非有限值或范数超出可信界限
    Malformed,
    /// 有效读数（基坐标系）
    Valid(Wrench),
}

impl WrenchReading {
    /// 按可信界限对原始读数分类
    pub fn classify(wrench: Wrench, max_norm: f64) -> Self {
        if wrench.is_finite() && wrench.norm() < max_norm {
            Self::Valid(wrench)
        } else {
            Self::Malformed
        }
    }

    /// 参与控制计算的力旋量（无效时为零）
    pub fn effective(&self) -> Wrench {
        match self {
            Self::Valid(w) => *w,
            _ => Wrench::zero(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// 每轴选择掩码（true 表示该轴处于力控）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisMask(pub [bool; 6]);

impl AxisMask {
    pub const NONE: AxisMask = AxisMask([false; 6]);
    pub const ALL: AxisMask = AxisMask([true; 6]);

    /// 仅指定轴为力控
    pub fn only(axes: &[usize]) -> Self {
        let mut mask = [false; 6];
        for &axis in axes {
            if axis < 6 {
                mask[axis] = true;
            }
        }
        Self(mask)
    }

    pub fn is_set(&self, axis: usize) -> bool {
        self.0.get(axis).copied().unwrap_or(false)
    }

    pub fn any_angular(&self) -> bool {
        self.0[3..].iter().any(|&b| b)
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&b| b)
    }
}

/// 位置模式设定点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSetpoint {
    pub pose: Pose,
    pub twist: Twist,
    pub accel: Accel,
}

impl MotionSetpoint {
    /// 静止于给定位姿
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            pose,
            twist: Twist::default(),
            accel: Accel::default(),
        }
    }
}

/// 力模式设定点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceSetpoint {
    pub wrench: Wrench,
    pub wrench_rate: Wrench,
    pub mask: AxisMask,
}

/// 设定点槽中的一项
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Motion(MotionSetpoint),
    Force(ForceSetpoint),
}

/// 柔顺坐标系：设定点叠加柔顺偏移后的输出
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompliantFrame {
    pub pose: Pose,
    pub twist: Twist,
    pub accel: Accel,
    /// 柔顺偏移 z（3 平移 + 3 旋转向量误差）
    pub offset: Vector6,
}
