//! 姿态与力旋量相关的小工具函数

use crate::types::Matrix6;
use nalgebra::{Matrix3, Quaternion, Unit, UnitQuaternion, Vector3};

/// 反对称矩阵 S(v)，满足 S(v)·w = v × w
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// 由标量部 eta 与向量部 eps 构造单位四元数
///
/// eta 截断到 [-1, 1]，theta = 2·acos(eta)，转轴 = eps / sin(theta/2)。
/// theta 为 0（或转轴退化）时返回 `None`。
pub fn quaternion_from_parts(eta: f64, eps: &Vector3<f64>) -> Option<UnitQuaternion<f64>> {
    let eta = eta.clamp(-1.0, 1.0);
    let theta = 2.0 * eta.acos();
    if theta == 0.0 {
        return None;
    }
    let half_sin = (theta / 2.0).sin();
    if half_sin.abs() < f64::EPSILON {
        return None;
    }
    let axis = eps / half_sin;
    if !axis.iter().all(|v| v.is_finite()) || axis.norm() < f64::EPSILON {
        return None;
    }
    Some(UnitQuaternion::from_axis_angle(
        &Unit::new_normalize(axis),
        theta,
    ))
}

/// 旋转向量误差 eps 的指数映射
///
/// eta = sqrt(1 - |eps|²)（|eps| ≥ 1 时取 0），输出始终为合法单位四元数；
/// eps 为零时返回单位四元数。
pub fn quaternion_from_eps(eps: &Vector3<f64>) -> UnitQuaternion<f64> {
    let eta = (1.0 - eps.norm_squared()).max(0.0).sqrt();
    quaternion_from_parts(eta, eps).unwrap_or_else(UnitQuaternion::identity)
}

/// 四元数运动学一步积分
///
/// eta' = -0.5·epsᵀω，eps' = 0.5·(eta·I − S(eps))·ω，积分后归一化。
/// 积分结果退化时保持原姿态。
pub fn integrate_quaternion(
    q: &UnitQuaternion<f64>,
    omega: &Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    let eta = q.w;
    let eps = q.imag();
    let eta_dot = -0.5 * eps.dot(omega);
    let eps_dot = 0.5 * (Matrix3::identity() * eta - skew(&eps)) * omega;
    let next = Quaternion::from_parts(eta + eta_dot * dt, eps + eps_dot * dt);
    if !next.coords.iter().all(|v| v.is_finite()) || next.norm() < f64::EPSILON {
        return *q;
    }
    UnitQuaternion::new_normalize(next)
}

/// 复合后重新归一化
pub fn renormalize(q: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::new_normalize(Quaternion::from(q.coords))
}

/// 静态力旋量变换 `[R 0; S(p)R R]`
///
/// 将传感器坐标系下的 (f, τ) 变换到基坐标系。
pub fn wrench_transform(rotation: &Matrix3<f64>, position: &Vector3<f64>) -> Matrix6 {
    let mut t = Matrix6::zeros();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    t.fixed_view_mut::<3, 3>(3, 3).copy_from(rotation);
    t.fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&(skew(position) * rotation));
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector6;

    /// 测试反对称矩阵等价于叉乘
    #[test]
    fn test_skew_cross() {
        let a = Vector3::new(1.0, -2.0, 0.5);
        let b = Vector3::new(0.3, 0.7, -1.1);
        let diff = skew(&a) * b - a.cross(&b);
        assert!(diff.norm() < 1e-12);
    }

    /// 测试零误差映射为单位四元数
    #[test]
    fn test_eps_zero_identity() {
        let q = quaternion_from_eps(&Vector3::zeros());
        assert_eq!(q, UnitQuaternion::identity());
    }

    /// 测试 |eps| < 1 时结果为单位四元数，且虚部与 eps 同向
    #[test]
    fn test_eps_unit_norm() {
        let eps = Vector3::new(0.1, -0.2, 0.3);
        let q = quaternion_from_eps(&eps);
        assert!((q.coords.norm() - 1.0).abs() < 1e-12);
        assert!((q.imag() - eps).norm() < 1e-12);
    }

    /// 测试 |eps| ≥ 1 时仍输出合法单位四元数（半周旋转）
    #[test]
    fn test_eps_saturated() {
        let q = quaternion_from_eps(&Vector3::new(2.0, 0.0, 0.0));
        assert!((q.coords.norm() - 1.0).abs() < 1e-12);
        assert!((q.angle() - std::f64::consts::PI).abs() < 1e-9);
    }

    /// 测试四元数积分：绕 z 轴恒角速度
    #[test]
    fn test_integrate_quaternion() {
        let mut q = UnitQuaternion::identity();
        let omega = Vector3::new(0.0, 0.0, 1.0);
        for _ in 0..100 {
            q = integrate_quaternion(&q, &omega, 0.001);
        }
        assert!((q.angle() - 0.1).abs() < 1e-3);
        assert!((q.coords.norm() - 1.0).abs() < 1e-12);
    }

    /// 测试纯平移偏移下的力旋量变换：τ' = τ + p × f
    #[test]
    fn test_wrench_transform() {
        let t = wrench_transform(&Matrix3::identity(), &Vector3::new(0.0, 0.0, 1.0));
        let h = Vector6::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let out = t * h;
        assert!((out[0] - 1.0).abs() < 1e-12);
        // (0,0,1) × (1,0,0) = (0,1,0)
        assert!((out[4] - 1.0).abs() < 1e-12);
    }
}
