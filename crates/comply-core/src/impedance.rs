//! 任务空间阻抗模型
//!
//! 以测得力旋量 h 驱动虚拟质量-弹簧-阻尼器：
//!
//! ```text
//! z̈ = M⁻¹ (h − D ż − K z)
//! ```
//!
//! 积分得到柔顺偏移 z（3 平移 + 3 旋转向量误差），叠加到设定点上输出柔顺坐标系。
//! M、D、K 均为对角阵，这里只存对角线。

use crate::math::{quaternion_from_eps, renormalize};
use crate::types::{
    Accel, CompliantFrame, MotionSetpoint, Pose, Twist, Vector6, WrenchReading,
};
use nalgebra::Vector3;

/// 对角阻抗参数（惯量 M、阻尼 D、刚度 K）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpedanceParams {
    pub mass: Vector6,
    pub damping: Vector6,
    pub stiffness: Vector6,
}

impl ImpedanceParams {
    pub fn new(mass: Vector6, damping: Vector6, stiffness: Vector6) -> Self {
        Self {
            mass,
            damping,
            stiffness,
        }
    }

    /// 所有对角元均为正且有限
    pub fn is_positive(&self) -> bool {
        self.mass
            .iter()
            .chain(self.damping.iter())
            .chain(self.stiffness.iter())
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// 阻抗模型诊断量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImpedanceDiagnostics {
    /// 存储能量 0.5·żᵀMż + 0.5·zᵀKz
    pub stored_energy: f64,
    /// 累计外力做功 Σ żᵀh·dt（仅计入有效读数）
    pub extracted_energy: f64,
    /// 瞬时净功率 żᵀh − żᵀDż；本 tick 读数无效时为 `None`
    pub net_power: Option<f64>,
}

/// 阻抗模型
#[derive(Debug, Clone)]
pub struct ImpedanceModel {
    z: Vector6,
    z_dot: Vector6,
    z_ddot: Vector6,
    dt: f64,
    orientation_compliance: bool,
    diagnostics: ImpedanceDiagnostics,
}

impl ImpedanceModel {
    /// 创建阻抗模型
    ///
    /// # 参数
    /// - `dt`: 积分步长（秒）
    /// - `orientation_compliance`: 是否允许姿态柔顺；关闭时 z̈ 的角部分恒为 0
    pub fn new(dt: f64, orientation_compliance: bool) -> Self {
        Self {
            z: Vector6::zeros(),
            z_dot: Vector6::zeros(),
            z_ddot: Vector6::zeros(),
            dt,
            orientation_compliance,
            diagnostics: ImpedanceDiagnostics::default(),
        }
    }

    pub fn z(&self) -> &Vector6 {
        &self.z
    }

    pub fn z_dot(&self) -> &Vector6 {
        &self.z_dot
    }

    pub fn z_ddot(&self) -> &Vector6 {
        &self.z_ddot
    }

    pub fn diagnostics(&self) -> &ImpedanceDiagnostics {
        &self.diagnostics
    }

    /// 清零柔顺状态与累计诊断量
    pub fn reset(&mut self) {
        self.z = Vector6::zeros();
        self.z_dot = Vector6::zeros();
        self.z_ddot = Vector6::zeros();
        self.diagnostics = ImpedanceDiagnostics::default();
    }

    /// 推进一步并输出柔顺坐标系
    ///
    /// - `NotYetReceived`：z̈ = 0，柔顺冻结
    /// - `Malformed`：按零力积分，不计入诊断
    /// - `Valid(h)`：正常积分
    pub fn step(
        &mut self,
        reading: &WrenchReading,
        params: &ImpedanceParams,
        setpoint: &MotionSetpoint,
    ) -> CompliantFrame {
        self.z_ddot = match reading {
            WrenchReading::NotYetReceived => Vector6::zeros(),
            _ => {
                let h = reading.effective().to_vector();
                let rhs = h
                    - params.damping.component_mul(&self.z_dot)
                    - params.stiffness.component_mul(&self.z);
                let mut acc = rhs.component_div(&params.mass);
                if !self.orientation_compliance {
                    acc.fixed_rows_mut::<3>(3).fill(0.0);
                }
                acc
            },
        };

        self.z_dot += self.z_ddot * self.dt;
        self.z += self.z_dot * self.dt;

        self.update_diagnostics(reading, params);
        self.compose(setpoint)
    }

    fn update_diagnostics(&mut self, reading: &WrenchReading, params: &ImpedanceParams) {
        let kinetic = 0.5 * self.z_dot.dot(&params.mass.component_mul(&self.z_dot));
        let potential = 0.5 * self.z.dot(&params.stiffness.component_mul(&self.z));
        self.diagnostics.stored_energy = kinetic + potential;

        self.diagnostics.net_power = match reading {
            WrenchReading::Valid(wrench) => {
                let h = wrench.to_vector();
                let contact_power = self.z_dot.dot(&h);
                self.diagnostics.extracted_energy += contact_power * self.dt;
                let dissipated = self.z_dot.dot(&params.damping.component_mul(&self.z_dot));
                Some(contact_power - dissipated)
            },
            _ => None,
        };
    }

    fn compose(&self, setpoint: &MotionSetpoint) -> CompliantFrame {
        let position = setpoint.pose.position + self.z.fixed_rows::<3>(0);

        // 旋转误差在基座系下表达，左乘到设定姿态上
        let eps: Vector3<f64> = self.z.fixed_rows::<3>(3).into_owned();
        let orientation = renormalize(&(quaternion_from_eps(&eps) * setpoint.pose.orientation));

        CompliantFrame {
            pose: Pose::new(position, orientation),
            twist: Twist::from_vector(&(setpoint.twist.to_vector() + self.z_dot)),
            accel: Accel::from_vector(&(setpoint.accel.to_vector() + self.z_ddot)),
            offset: self.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Wrench;
    use nalgebra::UnitQuaternion;

    fn nominal() -> ImpedanceParams {
        ImpedanceParams::new(
            Vector6::repeat(1.0),
            Vector6::repeat(15.0),
            Vector6::repeat(13.0),
        )
    }

    fn force_x(f: f64) -> WrenchReading {
        WrenchReading::Valid(Wrench::new(Vector3::new(f, 0.0, 0.0), Vector3::zeros()))
    }

    /// 测试零力、零初值时柔顺坐标系始终等于设定点
    #[test]
    fn test_zero_wrench_tracks_setpoint() {
        let mut model = ImpedanceModel::new(0.01, true);
        let params = nominal();
        for k in 0..100 {
            let t = k as f64 * 0.01;
            let setpoint = MotionSetpoint {
                pose: Pose::new(
                    Vector3::new(t, 0.5, 0.2),
                    UnitQuaternion::from_euler_angles(0.1 * t, 0.0, 0.3),
                ),
                twist: Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros()),
                accel: Accel::default(),
            };
            let frame = model.step(&force_x(0.0), &params, &setpoint);
            assert!((frame.pose.position - setpoint.pose.position).norm() < 1e-12);
            assert!(frame.pose.orientation.angle_to(&setpoint.pose.orientation) < 1e-9);
            assert!((frame.twist.to_vector() - setpoint.twist.to_vector()).norm() < 1e-12);
            assert_eq!(frame.offset, Vector6::zeros());
        }
    }

    /// 测试未收到力样本时柔顺冻结
    #[test]
    fn test_frozen_before_first_wrench() {
        let mut model = ImpedanceModel::new(0.01, false);
        let setpoint = MotionSetpoint::at_rest(Pose::from_translation(0.1, 0.2, 0.3));
        let frame = model.step(&WrenchReading::NotYetReceived, &nominal(), &setpoint);
        assert_eq!(model.z_ddot(), &Vector6::zeros());
        assert_eq!(frame.pose.position, setpoint.pose.position);
        assert!(model.diagnostics().net_power.is_none());
    }

    /// 测试恒力下偏移收敛到 f/K
    #[test]
    fn test_constant_force_steady_state() {
        let mut model = ImpedanceModel::new(0.001, false);
        let setpoint = MotionSetpoint::at_rest(Pose::identity());
        let mut frame = CompliantFrame::default();
        for _ in 0..20_000 {
            frame = model.step(&force_x(2.6), &nominal(), &setpoint);
        }
        assert!((frame.pose.position.x - 0.2).abs() < 1e-4);
        assert!(model.z_dot().norm() < 1e-6);
        let stored = model.diagnostics().stored_energy;
        assert!((stored - 0.5 * 13.0 * 0.04).abs() < 1e-3);
    }

    /// 测试异常读数按零力处理且不计入诊断
    #[test]
    fn test_malformed_treated_as_zero() {
        let mut model = ImpedanceModel::new(0.01, false);
        let setpoint = MotionSetpoint::at_rest(Pose::identity());
        for _ in 0..50 {
            model.step(&force_x(5.0), &nominal(), &setpoint);
        }
        let z_before = model.z()[0];
        let extracted = model.diagnostics().extracted_energy;
        assert!(z_before > 0.0);

        for _ in 0..300 {
            model.step(&WrenchReading::Malformed, &nominal(), &setpoint);
        }
        assert!(model.z()[0].abs() < z_before * 0.1);
        assert_eq!(model.diagnostics().extracted_energy, extracted);
        assert!(model.diagnostics().net_power.is_none());
    }

    /// 测试关闭姿态柔顺时力矩不产生姿态偏移
    #[test]
    fn test_orientation_blocked_by_default() {
        let mut model = ImpedanceModel::new(0.01, false);
        let torque = WrenchReading::Valid(Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 3.0)));
        let setpoint = MotionSetpoint::at_rest(Pose::identity());
        for _ in 0..100 {
            let frame = model.step(&torque, &nominal(), &setpoint);
            assert_eq!(frame.pose.orientation, UnitQuaternion::identity());
        }
        assert_eq!(model.z()[5], 0.0);
    }

    /// 测试开启姿态柔顺时输出合法单位四元数，且绕力矩方向偏转
    #[test]
    fn test_orientation_compliance_unit_quaternion() {
        let mut model = ImpedanceModel::new(0.01, true);
        let torque = WrenchReading::Valid(Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 3.0)));
        let setpoint = MotionSetpoint::at_rest(Pose::identity());
        let mut frame = CompliantFrame::default();
        for _ in 0..200 {
            frame = model.step(&torque, &nominal(), &setpoint);
            assert!((frame.pose.orientation.coords.norm() - 1.0).abs() < 1e-12);
        }
        let axis = frame.pose.orientation.axis().map(|a| a.into_inner());
        assert!(axis.is_some_and(|a| a.z > 0.99));
        assert!(frame.pose.orientation.angle() > 0.1);
    }

    /// 测试柔顺姿态相对设定姿态的旋转误差与 z 的角部分一致
    #[test]
    fn test_orientation_offset_matches_state() {
        let mut model = ImpedanceModel::new(0.01, true);
        let setpoint = MotionSetpoint::at_rest(Pose::new(
            Vector3::new(0.3, 0.0, 0.4),
            UnitQuaternion::from_euler_angles(0.4, -0.2, 1.1),
        ));
        let torque_x = WrenchReading::Valid(Wrench::new(Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0)));
        let torque_z = WrenchReading::Valid(Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 3.0)));

        let readings = std::iter::repeat_n(&torque_x, 60).chain(std::iter::repeat_n(&torque_z, 30));
        for reading in readings {
            let frame = model.step(reading, &nominal(), &setpoint);
            let relative = frame.pose.orientation * setpoint.pose.orientation.inverse();
            let q = relative.quaternion();
            let eps = if q.w < 0.0 { -q.imag() } else { q.imag() };
            let expected: Vector3<f64> = model.z().fixed_rows::<3>(3).into_owned();
            assert!((eps - expected).norm() < 1e-9);
        }
        assert!(model.z()[3] > 0.01);
        assert!(model.z()[5] > 0.01);
    }

    /// 测试参数正定性检查
    #[test]
    fn test_params_positive() {
        assert!(nominal().is_positive());
        let mut p = nominal();
        p.damping[3] = 0.0;
        assert!(!p.is_positive());
    }
}
