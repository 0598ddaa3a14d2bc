//! 能量罐（Energy Tank）
//!
//! 以标量储能 E（状态量 x_t = sqrt(2E)）约束变阻抗参数变化向系统注入的能量：
//! 阻尼耗散的能量按效率 eta 回收进罐，参数变化请求的功率从罐中扣除。
//! 罐能量接近 E_min 时，注入通道的缩放系数 alpha 平滑降为 0。
//!
//! # 使用示例
//!
//! ```rust
//! use comply_core::tank::EnergyTank;
//! use comply_core::config::TankConfig;
//!
//! let mut tank = EnergyTank::new(&TankConfig::default(), 0.01);
//! // 一个通道：请求功率 0.1W，同时阻尼耗散 0.05W
//! let alpha = tank.update(&[0.1], &[0.05])[0];
//! assert!(alpha > 0.0 && alpha <= 1.0);
//! ```

use crate::config::TankConfig;
use std::f64::consts::PI;
use tracing::trace;

/// x_t 低于此值时改用能量形式积分，避免 1/x_t 发散
const X_T_FLOOR: f64 = 1e-6;

/// 能量罐
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyTank {
    x_t: f64,
    min_energy: f64,
    max_energy: f64,
    eta: f64,
    dt: f64,
    alpha: Vec<f64>,
}

impl EnergyTank {
    /// 创建能量罐
    ///
    /// # 参数
    /// - `config`: 初始能量、上下界与回收效率
    /// - `dt`: 积分步长（秒）
    pub fn new(config: &TankConfig, dt: f64) -> Self {
        let initial = config.initial_energy.clamp(0.0, config.max_energy);
        Self {
            x_t: (2.0 * initial).sqrt(),
            min_energy: config.min_energy,
            max_energy: config.max_energy,
            eta: config.eta,
            dt,
            alpha: Vec::new(),
        }
    }

    /// 当前储能 E = 0.5·x_t²
    pub fn energy(&self) -> f64 {
        0.5 * self.x_t * self.x_t
    }

    pub fn x_t(&self) -> f64 {
        self.x_t
    }

    pub fn min_energy(&self) -> f64 {
        self.min_energy
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    /// 平滑激活函数 f(E) = 0.5·(1 − cos(π·(E − E_min)/(E_max − E_min)))
    ///
    /// E ≤ E_min 时为 0，E ≥ E_max 时为 1。
    pub fn activation(&self) -> f64 {
        let span = self.max_energy - self.min_energy;
        if span <= 0.0 {
            return 0.0;
        }
        let ratio = ((self.energy() - self.min_energy) / span).clamp(0.0, 1.0);
        0.5 * (1.0 - (PI * ratio).cos())
    }

    /// 最近一次更新的各通道缩放系数
    pub fn alphas(&self) -> &[f64] {
        &self.alpha
    }

    /// 推进一步并返回各通道的缩放系数 alpha
    ///
    /// # 参数
    /// - `inputs`: 各通道请求的功率（正值为从罐中取能）
    /// - `dissipations`: 各通道的耗散功率（回收进罐）
    ///
    /// alpha 基于本步积分前的储能计算；功率为负（向系统外释放）的通道 alpha 恒为 1。
    pub fn update(&mut self, inputs: &[f64], dissipations: &[f64]) -> &[f64] {
        let energy = self.energy();
        let beta = if energy <= self.max_energy { 1.0 } else { 0.0 };
        let activation = self.activation();

        self.alpha.resize(inputs.len(), 1.0);
        let mut power = 0.0;
        for (alpha, &input) in self.alpha.iter_mut().zip(inputs) {
            let gate = if input > 0.0 { 1.0 } else { 0.0 };
            *alpha = activation * gate + (1.0 - gate);
            if energy >= self.min_energy && input >= 0.0 {
                power += *alpha * input;
            }
        }

        let dissipation: f64 = dissipations.iter().map(|d| d.max(0.0)).sum();

        if self.x_t > X_T_FLOOR {
            let x_t_dot = (beta * self.eta / self.x_t) * dissipation - power / self.x_t;
            self.x_t += x_t_dot * self.dt;
        } else {
            // 罐近乎为空：E' = beta·eta·Diss − w
            let next = energy + (beta * self.eta * dissipation - power) * self.dt;
            self.x_t = (2.0 * next.max(0.0)).sqrt();
        }
        self.x_t = self.x_t.clamp(0.0, (2.0 * self.max_energy).sqrt());

        trace!(
            energy = self.energy(),
            power,
            dissipation,
            "energy tank updated"
        );
        &self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank(initial: f64) -> EnergyTank {
        EnergyTank::new(
            &TankConfig {
                initial_energy: initial,
                min_energy: 0.01,
                max_energy: 0.5,
                eta: 0.8,
            },
            0.01,
        )
    }

    /// 测试激活函数端点
    #[test]
    fn test_activation_endpoints() {
        assert!((tank(0.5).activation() - 1.0).abs() < 1e-12);
        assert_eq!(tank(0.01).activation(), 0.0);
        assert_eq!(tank(0.0).activation(), 0.0);
    }

    /// 测试释放功率（负输入）的通道不受限
    #[test]
    fn test_extraction_always_permitted() {
        let mut t = tank(0.01);
        let alphas = t.update(&[-1.0], &[0.0]);
        assert_eq!(alphas[0], 1.0);
    }

    /// 测试纯耗散时能量单调不减且不超过上界
    #[test]
    fn test_dissipation_fills_tank() {
        let mut t = tank(0.1);
        let mut prev = t.energy();
        for _ in 0..10_000 {
            t.update(&[0.0], &[2.0]);
            assert!(t.energy() >= prev - 1e-12);
            assert!(t.energy() <= 0.5 + 1e-12);
            prev = t.energy();
        }
        assert!((t.energy() - 0.5).abs() < 1e-9);
    }

    /// 测试持续取能时 alpha 随能量下降而严格减小
    #[test]
    fn test_alpha_decreases_toward_min() {
        let mut t = tank(0.5);
        let mut prev_alpha = f64::INFINITY;
        let mut prev_energy = t.energy();
        for _ in 0..200 {
            let alpha = t.update(&[1.0], &[0.0])[0];
            if prev_energy > t.min_energy() {
                assert!(alpha < prev_alpha || alpha == 0.0);
            }
            prev_alpha = alpha;
            prev_energy = t.energy();
        }
        assert!(prev_alpha < 0.05);
        assert!(t.energy() >= 0.0);
    }

    /// 测试空罐时不会产生 NaN
    #[test]
    fn test_empty_tank_is_finite() {
        let mut t = tank(0.0);
        for _ in 0..10 {
            let alpha = t.update(&[1.0, -0.5], &[0.1])[0];
            assert!(alpha.is_finite());
        }
        assert!(t.energy().is_finite());
        assert!(t.energy() > 0.0);
    }
}
