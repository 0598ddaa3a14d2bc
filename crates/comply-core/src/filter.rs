//! 单极点低通滤波器与一阶数值微分器
//!
//! # 使用示例
//!
//! ```rust
//! use comply_core::filter::LowPassFilter;
//!
//! // 采样周期 2ms，截止频率约 0.8Hz
//! let mut lpf = LowPassFilter::new(0.002, 5.0 / (2.0 * std::f64::consts::PI));
//! let y = lpf.update(1.0);
//! assert!(y > 0.0 && y < 1.0);
//! ```

use crate::types::Vector6;
use std::f64::consts::PI;

/// 单极点低通滤波器
///
/// `y += (x - y) · (1 - exp(-dt·2π·fc))`，初始输出为 0。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    output: f64,
    dt: f64,
    cutoff_hz: f64,
}

impl LowPassFilter {
    pub fn new(dt: f64, cutoff_hz: f64) -> Self {
        Self {
            output: 0.0,
            dt,
            cutoff_hz,
        }
    }

    /// 平滑系数 1 - exp(-dt·2π·fc)
    pub fn smoothing(dt: f64, cutoff_hz: f64) -> f64 {
        1.0 - (-dt * 2.0 * PI * cutoff_hz).exp()
    }

    pub fn update(&mut self, input: f64) -> f64 {
        self.output += (input - self.output) * Self::smoothing(self.dt, self.cutoff_hz);
        self.output
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn reset(&mut self) {
        self.output = 0.0;
    }
}

/// N 通道低通滤波器组（每通道独立状态）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelFilter<const N: usize> {
    channels: [LowPassFilter; N],
}

impl<const N: usize> ChannelFilter<N> {
    pub fn new(dt: f64, cutoff_hz: f64) -> Self {
        Self {
            channels: [LowPassFilter::new(dt, cutoff_hz); N],
        }
    }

    pub fn update(&mut self, input: &[f64; N]) -> [f64; N] {
        let mut out = [0.0; N];
        for ((y, x), filter) in out.iter_mut().zip(input).zip(self.channels.iter_mut()) {
            *y = filter.update(*x);
        }
        out
    }

    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(LowPassFilter::reset);
    }
}

/// 一阶"脏"微分器
///
/// `ẋ = g·(x − s)`，`s += g·dt·(x − s)`，用于从速度估计任务空间加速度。
#[derive(Debug, Clone, PartialEq)]
pub struct Differentiator {
    gain: f64,
    dt: f64,
    integral: Vector6,
}

impl Differentiator {
    /// 默认增益
    pub const DEFAULT_GAIN: f64 = 100.0;

    pub fn new(dt: f64, gain: f64) -> Self {
        Self {
            gain,
            dt,
            integral: Vector6::zeros(),
        }
    }

    pub fn update(&mut self, x: &Vector6) -> Vector6 {
        let error = x - self.integral;
        let derivative = error * self.gain;
        self.integral += error * (self.gain * self.dt);
        derivative
    }

    pub fn reset(&mut self) {
        self.integral = Vector6::zeros();
    }
}
