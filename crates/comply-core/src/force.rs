//! 力跟踪律（混合力/位置控制）
//!
//! 力控轴上按刚度参考的一阶力伺服生成期望运动：
//!
//! ```text
//! e   = h − h_d
//! ẍf = −D⁻¹ (−K (ẋ − ẋf) − K_h e + ḣ_d)
//! ```
//!
//! 非力控轴加速度与速度恒为 0，保持激活时的位姿。输出作为位置模式设定点
//! 送入阻抗模型。

use crate::impedance::ImpedanceParams;
use crate::math::integrate_quaternion;
use crate::types::{Accel, AxisMask, ForceSetpoint, MotionSetpoint, Pose, Twist, Vector6, Wrench};
use nalgebra::Vector3;
use tracing::debug;

/// 力跟踪律
#[derive(Debug, Clone)]
pub struct ForceTrackingLaw {
    pose: Pose,
    velocity: Vector6,
    accel: Vector6,
    mask: AxisMask,
    gain: f64,
    dt: f64,
    active: bool,
}

impl ForceTrackingLaw {
    /// 创建力跟踪律（初始未激活）
    ///
    /// # 参数
    /// - `gain`: 力误差增益 K_h
    /// - `dt`: 积分步长（秒）
    pub fn new(gain: f64, dt: f64) -> Self {
        Self {
            pose: Pose::identity(),
            velocity: Vector6::zeros(),
            accel: Vector6::zeros(),
            mask: AxisMask::NONE,
            gain,
            dt,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mask(&self) -> AxisMask {
        self.mask
    }

    /// 从当前期望运动进入力模式
    ///
    /// 力控轴继承当前期望速度，非力控轴速度置 0。
    pub fn activate(&mut self, start: &MotionSetpoint, mask: AxisMask) {
        self.pose = start.pose;
        self.velocity = start.twist.to_vector();
        for i in 0..6 {
            if !mask.is_set(i) {
                self.velocity[i] = 0.0;
            }
        }
        self.accel = Vector6::zeros();
        self.mask = mask;
        self.active = true;
        debug!("Force tracking activated with mask {:?}", mask.0);
    }

    /// 更新力控掩码（不重置积分状态）
    pub fn set_mask(&mut self, mask: AxisMask) {
        for i in 0..6 {
            if !mask.is_set(i) {
                self.velocity[i] = 0.0;
            }
        }
        self.mask = mask;
    }

    pub fn deactivate(&mut self) {
        if self.active {
            debug!("Force tracking deactivated");
        }
        self.active = false;
    }

    /// 推进一步，输出期望运动
    ///
    /// # 参数
    /// - `measured`: 测得力旋量（基坐标系）
    /// - `target`: 期望力旋量、变化率与掩码
    /// - `current_velocity`: 当前柔顺速度 ẋ
    /// - `params`: 当前阻抗参数（取 D、K）
    pub fn step(
        &mut self,
        measured: &Wrench,
        target: &ForceSetpoint,
        current_velocity: &Vector6,
        params: &ImpedanceParams,
    ) -> MotionSetpoint {
        if target.mask != self.mask {
            self.set_mask(target.mask);
        }

        let error = measured.to_vector() - target.wrench.to_vector();
        let rate = target.wrench_rate.to_vector();

        for i in 0..6 {
            if self.mask.is_set(i) {
                let servo = -params.stiffness[i] * (current_velocity[i] - self.velocity[i])
                    - self.gain * error[i]
                    + rate[i];
                self.accel[i] = -servo / params.damping[i];
                self.velocity[i] += self.accel[i] * self.dt;
            } else {
                self.accel[i] = 0.0;
                self.velocity[i] = 0.0;
            }
        }

        for i in 0..3 {
            if self.mask.is_set(i) {
                self.pose.position[i] += self.velocity[i] * self.dt;
            }
        }
        if self.mask.any_angular() {
            let omega = Vector3::new(self.velocity[3], self.velocity[4], self.velocity[5]);
            self.pose.orientation = integrate_quaternion(&self.pose.orientation, &omega, self.dt);
        }

        self.setpoint()
    }

    /// 当前期望运动
    pub fn setpoint(&self) -> MotionSetpoint {
        MotionSetpoint {
            pose: self.pose,
            twist: Twist::from_vector(&self.velocity),
            accel: Accel::from_vector(&self.accel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GainProfile;

    fn params() -> ImpedanceParams {
        GainProfile::uniform(1.0, 15.0, 13.0).params()
    }

    fn target_z(fz: f64) -> ForceSetpoint {
        ForceSetpoint {
            wrench: Wrench::new(Vector3::new(0.0, 0.0, fz), Vector3::zeros()),
            wrench_rate: Wrench::zero(),
            mask: AxisMask::only(&[2]),
        }
    }

    /// 测试激活时非力控轴速度清零，力控轴继承速度
    #[test]
    fn test_activate_zeroes_unmasked() {
        let mut law = ForceTrackingLaw::new(5.0, 0.01);
        let start = MotionSetpoint {
            pose: Pose::from_translation(0.1, 0.2, 0.3),
            twist: Twist::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.1, 0.2, 0.3)),
            accel: Accel::default(),
        };
        law.activate(&start, AxisMask::only(&[2]));
        let sp = law.setpoint();
        assert!(law.is_active());
        assert_eq!(sp.twist.linear, Vector3::new(0.0, 0.0, 3.0));
        assert_eq!(sp.twist.angular, Vector3::zeros());
        assert_eq!(sp.pose, start.pose);
    }

    /// 测试非力控轴保持位姿
    #[test]
    fn test_unmasked_axes_hold() {
        let mut law = ForceTrackingLaw::new(5.0, 0.01);
        let start = MotionSetpoint::at_rest(Pose::from_translation(0.1, 0.2, 0.3));
        law.activate(&start, AxisMask::only(&[2]));
        let measured = Wrench::new(Vector3::new(4.0, -3.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        for _ in 0..100 {
            let sp = law.step(&measured, &target_z(-5.0), &Vector6::zeros(), &params());
            assert_eq!(sp.pose.position.x, 0.1);
            assert_eq!(sp.pose.position.y, 0.2);
            assert_eq!(sp.accel.linear.x, 0.0);
            assert_eq!(sp.pose.orientation, start.pose.orientation);
        }
    }

    /// 测试测得力大于期望力时沿该轴后退（误差为正 → 正向加速度）
    #[test]
    fn test_force_error_drives_motion() {
        let mut law = ForceTrackingLaw::new(5.0, 0.01);
        law.activate(&MotionSetpoint::at_rest(Pose::identity()), AxisMask::only(&[2]));
        let measured = Wrench::zero();
        let sp = law.step(&measured, &target_z(-3.0), &Vector6::zeros(), &params());
        // e = 0 − (−3) = 3，ẍ = K_h·e / D = 1.0
        assert!((sp.accel.linear.z - 1.0).abs() < 1e-12);
        assert!(sp.twist.linear.z > 0.0);
    }

    /// 测试力误差为零且速度一致时保持静止
    #[test]
    fn test_equilibrium() {
        let mut law = ForceTrackingLaw::new(5.0, 0.01);
        law.activate(&MotionSetpoint::at_rest(Pose::identity()), AxisMask::only(&[2]));
        let measured = Wrench::new(Vector3::new(0.0, 0.0, -3.0), Vector3::zeros());
        for _ in 0..10 {
            let sp = law.step(&measured, &target_z(-3.0), &Vector6::zeros(), &params());
            assert_eq!(sp.accel.linear.z, 0.0);
            assert_eq!(sp.pose.position.z, 0.0);
        }
    }

    /// 测试姿态轴力控时输出单位四元数
    #[test]
    fn test_angular_axis_integrates_orientation() {
        let mut law = ForceTrackingLaw::new(5.0, 0.01);
        law.activate(&MotionSetpoint::at_rest(Pose::identity()), AxisMask::only(&[5]));
        let target = ForceSetpoint {
            wrench: Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0)),
            wrench_rate: Wrench::zero(),
            mask: AxisMask::only(&[5]),
        };
        let mut sp = law.setpoint();
        for _ in 0..50 {
            sp = law.step(&Wrench::zero(), &target, &Vector6::zeros(), &params());
        }
        assert!((sp.pose.orientation.coords.norm() - 1.0).abs() < 1e-12);
        assert!(sp.pose.orientation.angle() > 0.0);
    }
}
