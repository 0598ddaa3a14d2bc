//! 运动学协作者接口
//!
//! 控制循环只通过 [`Kinematics`] trait 访问正/逆运动学与雅可比，
//! 具体实现（URDF 模型、解析解、仿真模型）由上层提供。

use crate::error::KinematicsError;
use comply_core::{Pose, Twist};
use nalgebra::{DMatrix, DVector};

/// 关节向量（长度为自由度数）
pub type JointVector = DVector<f64>;

/// 正运动学结果
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardKinematics {
    /// 末端位姿
    pub pose: Pose,
    /// 末端速度 J·q̇
    pub twist: Twist,
    /// 几何雅可比（6×N）
    pub jacobian: DMatrix<f64>,
    /// 雅可比导数 J̇（6×N）
    pub jacobian_rate: DMatrix<f64>,
}

/// 运动学协作者
///
/// 实现需要线程安全：正运动学在传感器回调线程调用，逆运动学在控制线程调用。
pub trait Kinematics: Send + Sync {
    /// 自由度数 N
    fn dof(&self) -> usize;

    /// 正运动学
    fn forward(
        &self,
        positions: &JointVector,
        velocities: &JointVector,
    ) -> Result<ForwardKinematics, KinematicsError>;

    /// 逆运动学
    ///
    /// # 参数
    /// - `seed`: 当前关节位置（作为迭代初值）
    /// - `target`: 目标末端位姿
    ///
    /// 无解时返回 [`KinematicsError::Unsolved`]。
    fn inverse(&self, seed: &JointVector, target: &Pose) -> Result<JointVector, KinematicsError>;

    /// 检查关节向量维度
    fn check_dof(&self, joints: &JointVector) -> Result<(), KinematicsError> {
        if joints.len() == self.dof() {
            Ok(())
        } else {
            Err(KinematicsError::DimensionMismatch {
                expected: self.dof(),
                actual: joints.len(),
            })
        }
    }
}

/// 笛卡尔"虚拟臂"
///
/// 6 个关节直接对应末端 `[x, y, z, rx, ry, rz]`（后三项为旋转向量），
/// 雅可比恒为单位阵。用于仿真、联调与测试。可选的可达半径用于模拟逆解失败。
#[derive(Debug, Clone, Default)]
pub struct CartesianKinematics {
    reach: Option<f64>,
}

impl CartesianKinematics {
    pub fn new() -> Self {
        Self { reach: None }
    }

    /// 末端到原点距离超过 `reach` 时逆解失败
    pub fn with_reach(reach: f64) -> Self {
        Self { reach: Some(reach) }
    }

    /// 由末端位姿构造关节向量
    pub fn joints_for(pose: &Pose) -> JointVector {
        let r = pose.orientation.scaled_axis();
        JointVector::from_vec(vec![
            pose.position.x,
            pose.position.y,
            pose.position.z,
            r.x,
            r.y,
            r.z,
        ])
    }
}

impl Kinematics for CartesianKinematics {
    fn dof(&self) -> usize {
        6
    }

    fn forward(
        &self,
        positions: &JointVector,
        velocities: &JointVector,
    ) -> Result<ForwardKinematics, KinematicsError> {
        self.check_dof(positions)?;
        self.check_dof(velocities)?;
        let position = nalgebra::Vector3::new(positions[0], positions[1], positions[2]);
        let rotation = nalgebra::Vector3::new(positions[3], positions[4], positions[5]);
        let pose = Pose::new(position, nalgebra::UnitQuaternion::from_scaled_axis(rotation));
        let twist = Twist::new(
            nalgebra::Vector3::new(velocities[0], velocities[1], velocities[2]),
            nalgebra::Vector3::new(velocities[3], velocities[4], velocities[5]),
        );
        Ok(ForwardKinematics {
            pose,
            twist,
            jacobian: DMatrix::identity(6, 6),
            jacobian_rate: DMatrix::zeros(6, 6),
        })
    }

    fn inverse(&self, seed: &JointVector, target: &Pose) -> Result<JointVector, KinematicsError> {
        self.check_dof(seed)?;
        if !target.is_finite() {
            return Err(KinematicsError::Unsolved);
        }
        if let Some(reach) = self.reach
            && target.position.norm() > reach
        {
            return Err(KinematicsError::Unsolved);
        }
        Ok(Self::joints_for(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试虚拟臂正逆解互逆
    #[test]
    fn test_cartesian_forward_inverse() {
        let kin = CartesianKinematics::new();
        let pose = Pose::new(
            nalgebra::Vector3::new(0.3, -0.1, 0.5),
            nalgebra::UnitQuaternion::from_euler_angles(0.1, 0.2, -0.3),
        );
        let q = kin.inverse(&JointVector::zeros(6), &pose).unwrap();
        let fk = kin.forward(&q, &JointVector::zeros(6)).unwrap();
        assert!((fk.pose.position - pose.position).norm() < 1e-12);
        assert!(fk.pose.orientation.angle_to(&pose.orientation) < 1e-9);
    }

    /// 测试可达半径外逆解失败
    #[test]
    fn test_cartesian_reach_limit() {
        let kin = CartesianKinematics::with_reach(1.0);
        let far = Pose::from_translation(2.0, 0.0, 0.0);
        assert_eq!(
            kin.inverse(&JointVector::zeros(6), &far),
            Err(KinematicsError::Unsolved)
        );
    }

    /// 测试维度检查
    #[test]
    fn test_dimension_mismatch() {
        let kin = CartesianKinematics::new();
        let err = kin
            .forward(&JointVector::zeros(7), &JointVector::zeros(7))
            .unwrap_err();
        assert_eq!(
            err,
            KinematicsError::DimensionMismatch {
                expected: 6,
                actual: 7
            }
        );
    }
}
