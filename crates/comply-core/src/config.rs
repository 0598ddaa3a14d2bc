//! 控制器配置
//!
//! 配置以 TOML 文件描述，所有字段均有默认值（缺省字段取默认）。
//!
//! # 使用示例
//!
//! ```rust
//! use comply_core::ControllerConfig;
//!
//! let config = ControllerConfig::from_toml_str(
//!     r#"
//!     [loop]
//!     sample_time = 0.005
//!
//!     [tank]
//!     max_energy = 1.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.control_loop.sample_time, 0.005);
//! assert_eq!(config.tank.max_energy, 1.0);
//! ```

use crate::contact::ContactState;
use crate::error::ConfigError;
use crate::impedance::ImpedanceParams;
use crate::types::Vector6;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;

/// 控制器总配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(rename = "loop")]
    pub control_loop: LoopConfig,
    pub tank: TankConfig,
    pub impedance: ImpedanceConfig,
    pub contact: ContactConfig,
    pub force: ForceConfig,
    pub correction: CorrectionConfig,
    pub workspace: WorkspaceLimits,
}

/// 控制循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// 控制周期 T（秒）
    pub sample_time: f64,
    /// 关节状态采样周期（秒），用于末端加速度数值微分
    pub joint_sample_time: f64,
    /// 等待新数据的超时（毫秒），超时则跳过本 tick
    pub data_timeout_ms: u64,
    /// 启动前是否必须收到第一个力传感器样本
    pub require_wrench: bool,
    /// 启动前等待首个样本的最长时间（毫秒）
    pub startup_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            sample_time: 0.01,
            joint_sample_time: 0.002,
            data_timeout_ms: 20,
            require_wrench: true,
            startup_timeout_ms: 5000,
        }
    }
}

impl LoopConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.sample_time)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// 能量罐配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    pub initial_energy: f64,
    pub min_energy: f64,
    pub max_energy: f64,
    /// 耗散能量回收效率
    pub eta: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            initial_energy: 0.5,
            min_energy: 0.01,
            max_energy: 0.5,
            eta: 0.8,
        }
    }
}

/// 一组对角阻抗参数（按 6 个轴给出）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainProfile {
    pub mass: [f64; 6],
    pub damping: [f64; 6],
    pub stiffness: [f64; 6],
}

impl GainProfile {
    /// 各轴取相同值
    pub fn uniform(mass: f64, damping: f64, stiffness: f64) -> Self {
        Self {
            mass: [mass; 6],
            damping: [damping; 6],
            stiffness: [stiffness; 6],
        }
    }

    pub fn params(&self) -> ImpedanceParams {
        ImpedanceParams::new(
            Vector6::from_row_slice(&self.mass),
            Vector6::from_row_slice(&self.damping),
            Vector6::from_row_slice(&self.stiffness),
        )
    }
}

/// 阻抗配置：名义参数 + 各接触状态的目标参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpedanceConfig {
    /// 名义值与目标值之间的渐变时间（秒）
    pub ramp_time: f64,
    /// 是否启用姿态柔顺（默认仅平移柔顺）
    pub orientation_compliance: bool,
    pub nominal: GainProfile,
    pub hooked: GainProfile,
    pub impact: GainProfile,
}

impl Default for ImpedanceConfig {
    fn default() -> Self {
        let mut impact = GainProfile::uniform(30.0, 800.0, 400.0);
        // y 轴保持低阻抗
        impact.mass[1] = 1.0;
        impact.damping[1] = 30.0;
        impact.stiffness[1] = 20.0;
        Self {
            ramp_time: 0.5,
            orientation_compliance: false,
            nominal: GainProfile::uniform(1.0, 15.0, 13.0),
            hooked: GainProfile::uniform(3.0, 30.0, 13.0),
            impact,
        }
    }
}

impl ImpedanceConfig {
    /// 某接触状态对应的升级目标；去升级状态返回 `None`
    pub fn target_for(&self, state: ContactState) -> Option<&GainProfile> {
        match state {
            ContactState::Hooked => Some(&self.hooked),
            ContactState::Impact => Some(&self.impact),
            ContactState::Free | ContactState::Detached => None,
        }
    }
}

/// 接触分类配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// FREE→HOOKED：‖h‖ 下界（N）
    pub hook_force_low: f64,
    /// FREE→HOOKED：‖h‖ 上界（N）
    pub hook_force_high: f64,
    /// HOOKED→DETACHED：h.z 下界
    pub detach_force_low: f64,
    /// HOOKED→DETACHED：h.z 上界
    pub detach_force_high: f64,
    /// 去抖基准时间（秒）
    pub debounce_base: f64,
    pub hook_debounce_factor: f64,
    pub detach_debounce_factor: f64,
    pub impact_debounce_factor: f64,
    pub release_debounce_factor: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            hook_force_low: 0.5,
            hook_force_high: 3.0,
            detach_force_low: -2.0,
            detach_force_high: -1.0,
            debounce_base: 1.0,
            hook_debounce_factor: 2.0,
            detach_debounce_factor: 4.0,
            impact_debounce_factor: 4.0,
            release_debounce_factor: 4.0,
        }
    }
}

/// 力控与力传感器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    /// 力跟踪增益 K_h
    pub tracking_gain: f64,
    /// 偏置估计样本数 K
    pub bias_samples: u32,
    /// 力传感器采样周期（秒）
    pub sensor_sample_time: f64,
    /// 力传感器低通截止频率（Hz）
    pub filter_cutoff_hz: f64,
    /// 可信范数上界，超出视为异常读数
    pub max_wrench_norm: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            tracking_gain: 5.0,
            bias_samples: 500,
            sensor_sample_time: 0.002,
            filter_cutoff_hz: 5.0 / (2.0 * PI),
            max_wrench_norm: 1000.0,
        }
    }
}

/// 外部位置反馈修正配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// 每轴修正量上限（米）
    pub limit: f64,
    /// 低通截止频率（Hz）
    pub cutoff_hz: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            limit: 0.02,
            cutoff_hz: 30.0 / (2.0 * PI),
        }
    }
}

/// 单轴上下限（缺省为不限）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl AxisLimit {
    pub fn clamp(&self, v: f64) -> f64 {
        let v = self.max.map_or(v, |max| v.min(max));
        self.min.map_or(v, |min| v.max(min))
    }
}

/// 笛卡尔工作空间边界
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceLimits {
    pub x: AxisLimit,
    pub y: AxisLimit,
    pub z: AxisLimit,
}

impl Default for WorkspaceLimits {
    fn default() -> Self {
        Self {
            x: AxisLimit::default(),
            y: AxisLimit {
                min: None,
                max: Some(0.75),
            },
            z: AxisLimit::default(),
        }
    }
}

impl WorkspaceLimits {
    /// 不限制任何轴
    pub fn unbounded() -> Self {
        Self {
            x: AxisLimit::default(),
            y: AxisLimit::default(),
            z: AxisLimit::default(),
        }
    }

    pub fn clamp(&self, p: &nalgebra::Vector3<f64>) -> nalgebra::Vector3<f64> {
        nalgebra::Vector3::new(self.x.clamp(p.x), self.y.clamp(p.y), self.z.clamp(p.z))
    }
}

impl ControllerConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 校验所有字段
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.control_loop;
        if !(l.sample_time.is_finite() && l.sample_time > 0.0) {
            return Err(ConfigError::invalid("loop.sample_time", "must be positive"));
        }
        if !(l.joint_sample_time.is_finite() && l.joint_sample_time > 0.0) {
            return Err(ConfigError::invalid("loop.joint_sample_time", "must be positive"));
        }
        if l.data_timeout_ms == 0 {
            return Err(ConfigError::invalid("loop.data_timeout_ms", "must be non-zero"));
        }

        let t = &self.tank;
        if !(t.min_energy >= 0.0 && t.max_energy > t.min_energy) {
            return Err(ConfigError::invalid(
                "tank",
                format!(
                    "require 0 <= min_energy < max_energy, got [{}, {}]",
                    t.min_energy, t.max_energy
                ),
            ));
        }
        if !(0.0..=t.max_energy).contains(&t.initial_energy) {
            return Err(ConfigError::invalid(
                "tank.initial_energy",
                format!("must lie in [0, {}]", t.max_energy),
            ));
        }
        if !(t.eta > 0.0 && t.eta <= 1.0) {
            return Err(ConfigError::invalid("tank.eta", "must lie in (0, 1]"));
        }

        let imp = &self.impedance;
        for (field, profile) in [
            ("impedance.nominal", &imp.nominal),
            ("impedance.hooked", &imp.hooked),
            ("impedance.impact", &imp.impact),
        ] {
            let mut gains = profile
                .mass
                .iter()
                .chain(&profile.damping)
                .chain(&profile.stiffness);
            if !gains.all(|v| v.is_finite() && *v > 0.0) {
                return Err(ConfigError::invalid(field, "gains must be positive and finite"));
            }
        }
        if !(imp.ramp_time.is_finite() && imp.ramp_time > 0.0) {
            return Err(ConfigError::invalid("impedance.ramp_time", "must be positive"));
        }

        let c = &self.contact;
        if c.hook_force_low >= c.hook_force_high {
            return Err(ConfigError::invalid(
                "contact.hook_force_low",
                "must be below hook_force_high",
            ));
        }
        if c.detach_force_low >= c.detach_force_high {
            return Err(ConfigError::invalid(
                "contact.detach_force_low",
                "must be below detach_force_high",
            ));
        }
        let factors = [
            c.hook_debounce_factor,
            c.detach_debounce_factor,
            c.impact_debounce_factor,
            c.release_debounce_factor,
        ];
        if !(c.debounce_base > 0.0 && factors.iter().all(|f| *f > 0.0)) {
            return Err(ConfigError::invalid(
                "contact.debounce_base",
                "debounce base and factors must be positive",
            ));
        }

        let f = &self.force;
        if !(f.tracking_gain.is_finite() && f.tracking_gain >= 0.0) {
            return Err(ConfigError::invalid("force.tracking_gain", "must be non-negative"));
        }
        if !(f.sensor_sample_time > 0.0 && f.filter_cutoff_hz > 0.0) {
            return Err(ConfigError::invalid(
                "force.sensor_sample_time",
                "sample time and cutoff must be positive",
            ));
        }
        if f.max_wrench_norm <= 0.0 {
            return Err(ConfigError::invalid("force.max_wrench_norm", "must be positive"));
        }

        if !(self.correction.limit >= 0.0 && self.correction.cutoff_hz > 0.0) {
            return Err(ConfigError::invalid(
                "correction",
                "limit must be non-negative and cutoff positive",
            ));
        }

        for (field, axis) in [
            ("workspace.x", &self.workspace.x),
            ("workspace.y", &self.workspace.y),
            ("workspace.z", &self.workspace.z),
        ] {
            if let (Some(min), Some(max)) = (axis.min, axis.max)
                && min > max
            {
                return Err(ConfigError::invalid(field, "min must not exceed max"));
            }
        }
        Ok(())
    }
}
