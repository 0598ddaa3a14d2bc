//! 基于 `k` 的 URDF 串联链运动学
//!
//! `k` 依赖的 nalgebra 版本与本工作空间不同，两侧只通过 `f64` 数组交换数据。

use comply_core::Pose;
use comply_driver::{ForwardKinematics, JointVector, Kinematics, KinematicsError};
use k::InverseKinematicsSolver;
use k::nalgebra as kna;
use nalgebra::{DMatrix, Quaternion, UnitQuaternion, Vector3};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

/// 数值逆解参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkParams {
    /// 位置容差（米）
    pub allowable_distance: f64,
    /// 姿态容差（弧度）
    pub allowable_angle: f64,
    /// 每次迭代的雅可比步长系数
    pub jacobian_multiplier: f64,
    /// 最大迭代次数
    pub max_iterations: usize,
}

impl Default for IkParams {
    fn default() -> Self {
        Self {
            allowable_distance: 1e-4,
            allowable_angle: 1e-3,
            jacobian_multiplier: 0.5,
            max_iterations: 100,
        }
    }
}

/// URDF 串联链运动学
///
/// 链状态（关节位置缓存）以互斥量保护：正运动学在传感器线程、逆运动学在控制线程调用。
pub struct UrdfKinematics {
    arm: Mutex<k::SerialChain<f64>>,
    solver: k::JacobianIkSolver<f64>,
    dof: usize,
}

/// 数值求 J̇ 的步长（秒）
const JACOBIAN_RATE_STEP: f64 = 1e-6;

impl UrdfKinematics {
    /// 从 URDF 文件构造，链从根到 `end_joint`（关节名）
    ///
    /// # 错误
    /// - `Model`: 文件无法解析或找不到末端关节
    pub fn from_urdf_file(path: impl AsRef<Path>, end_joint: &str) -> Result<Self, KinematicsError> {
        Self::with_ik_params(path, end_joint, IkParams::default())
    }

    /// 同 [`from_urdf_file`](Self::from_urdf_file)，并指定逆解参数
    pub fn with_ik_params(
        path: impl AsRef<Path>,
        end_joint: &str,
        params: IkParams,
    ) -> Result<Self, KinematicsError> {
        let path = path.as_ref();
        let chain = k::Chain::<f64>::from_urdf_file(path).map_err(|e| {
            KinematicsError::Model(format!("failed to load {}: {}", path.display(), e))
        })?;
        let end = chain.find(end_joint).ok_or_else(|| {
            KinematicsError::Model(format!("joint '{}' not found in {}", end_joint, path.display()))
        })?;
        let arm = k::SerialChain::from_end(end);
        let dof = arm.dof();
        if dof == 0 {
            return Err(KinematicsError::Model(format!(
                "chain ending at '{}' has no movable joints",
                end_joint
            )));
        }
        info!(
            "Loaded URDF chain from {} ending at '{}' ({} DOF)",
            path.display(),
            end_joint,
            dof
        );

        Ok(Self {
            arm: Mutex::new(arm),
            solver: k::JacobianIkSolver::new(
                params.allowable_distance,
                params.allowable_angle,
                params.jacobian_multiplier,
                params.max_iterations,
            ),
            dof,
        })
    }

    fn set_positions(arm: &k::SerialChain<f64>, q: &JointVector) -> Result<(), KinematicsError> {
        arm.set_joint_positions(q.as_slice())
            .map_err(|e| KinematicsError::Model(e.to_string()))
    }

    fn jacobian(arm: &k::SerialChain<f64>, dof: usize) -> DMatrix<f64> {
        let jac = k::jacobian(arm);
        DMatrix::from_fn(6, dof, |r, c| jac[(r, c)])
    }

    fn pose_from(transform: &kna::Isometry3<f64>) -> Pose {
        let t = &transform.translation.vector;
        let q = transform.rotation.quaternion();
        Pose::new(
            Vector3::new(t.x, t.y, t.z),
            UnitQuaternion::new_normalize(Quaternion::new(q.w, q.i, q.j, q.k)),
        )
    }

    fn isometry_from(pose: &Pose) -> kna::Isometry3<f64> {
        let p = &pose.position;
        let q = pose.orientation.quaternion();
        kna::Isometry3::from_parts(
            kna::Translation3::new(p.x, p.y, p.z),
            kna::UnitQuaternion::new_normalize(kna::Quaternion::new(q.w, q.i, q.j, q.k)),
        )
    }
}

impl Kinematics for UrdfKinematics {
    fn dof(&self) -> usize {
        self.dof
    }

    fn forward(
        &self,
        positions: &JointVector,
        velocities: &JointVector,
    ) -> Result<ForwardKinematics, KinematicsError> {
        self.check_dof(positions)?;
        self.check_dof(velocities)?;

        let arm = self.arm.lock();
        Self::set_positions(&arm, positions)?;
        let pose = Self::pose_from(&arm.end_transform());
        let jacobian = Self::jacobian(&arm, self.dof);

        // J̇ ≈ (J(q + q̇·δ) − J(q)) / δ
        let ahead = positions + velocities * JACOBIAN_RATE_STEP;
        Self::set_positions(&arm, &ahead)?;
        let jacobian_rate = (Self::jacobian(&arm, self.dof) - &jacobian) / JACOBIAN_RATE_STEP;
        Self::set_positions(&arm, positions)?;
        drop(arm);

        let twist = &jacobian * velocities;
        Ok(ForwardKinematics {
            pose,
            twist: comply_core::Twist::new(
                Vector3::new(twist[0], twist[1], twist[2]),
                Vector3::new(twist[3], twist[4], twist[5]),
            ),
            jacobian,
            jacobian_rate,
        })
    }

    fn inverse(&self, seed: &JointVector, target: &Pose) -> Result<JointVector, KinematicsError> {
        self.check_dof(seed)?;
        if !target.is_finite() {
            return Err(KinematicsError::Unsolved);
        }

        let arm = self.arm.lock();
        Self::set_positions(&arm, seed)?;
        match self.solver.solve(&arm, &Self::isometry_from(target)) {
            Ok(()) => Ok(JointVector::from_vec(arm.joint_positions())),
            Err(e) => {
                debug!("URDF inverse kinematics failed: {}", e);
                Err(KinematicsError::Unsolved)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> UrdfKinematics {
        UrdfKinematics::from_urdf_file(
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/six_axis.urdf"),
            "joint6",
        )
        .unwrap()
    }

    /// 测试零位正运动学
    #[test]
    fn test_forward_at_zero() {
        let arm = arm();
        assert_eq!(arm.dof(), 6);
        let fk = arm
            .forward(&JointVector::zeros(6), &JointVector::zeros(6))
            .unwrap();
        assert!((fk.pose.position - Vector3::new(0.35, 0.0, 0.5)).norm() < 1e-9);
        assert!(fk.pose.orientation.angle() < 1e-9);
        assert_eq!(fk.jacobian.shape(), (6, 6));
        assert!(fk.twist.linear.norm() < 1e-12);
    }

    /// 测试末端速度等于 J·q̇（绕第一轴旋转）
    #[test]
    fn test_twist_from_first_joint() {
        let arm = arm();
        let mut qd = JointVector::zeros(6);
        qd[0] = 1.0;
        let fk = arm.forward(&JointVector::zeros(6), &qd).unwrap();
        // ω = ẑ，v = ω × p = (0, 0.35, 0)
        assert!((fk.twist.angular - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-9);
        assert!((fk.twist.linear - Vector3::new(0.0, 0.35, 0.0)).norm() < 1e-9);
    }

    /// 测试逆解回到正解位姿
    #[test]
    fn test_inverse_round_trip() {
        let arm = arm();
        let q = JointVector::from_vec(vec![0.1, 0.2, 0.3, 0.1, 0.4, 0.2]);
        let target = arm.forward(&q, &JointVector::zeros(6)).unwrap().pose;

        let seed = q.add_scalar(0.05);
        let solved = arm.inverse(&seed, &target).unwrap();
        let reached = arm.forward(&solved, &JointVector::zeros(6)).unwrap().pose;
        assert!((reached.position - target.position).norm() < 2e-3);
        assert!(reached.orientation.angle_to(&target.orientation) < 1e-2);
    }

    /// 测试加载失败与维度错误
    #[test]
    fn test_errors() {
        assert!(matches!(
            UrdfKinematics::from_urdf_file("/nonexistent.urdf", "joint6"),
            Err(KinematicsError::Model(_))
        ));
        let missing = UrdfKinematics::from_urdf_file(
            concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/six_axis.urdf"),
            "joint9",
        );
        assert!(matches!(missing, Err(KinematicsError::Model(_))));
        assert_eq!(
            arm().inverse(&JointVector::zeros(5), &Pose::identity()),
            Err(KinematicsError::DimensionMismatch {
                expected: 6,
                actual: 5
            })
        );
    }
}
