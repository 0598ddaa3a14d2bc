//! 接触状态机
//!
//! 按滤波后的接触力与外部"完成"信号对接触进行分类，驱动阻抗调度目标。
//! 状态循环：FREE → HOOKED → DETACHED → IMPACT → FREE。
//!
//! | 当前状态 | 守卫条件 | 去抖时间 | 下一状态 |
//! |---|---|---|---|
//! | FREE | ‖h‖ ∈ (low, high) | 2·T | HOOKED |
//! | HOOKED | h.z ∈ (−2, −1) | 4·T | DETACHED |
//! | DETACHED | 轨迹完成 | 4·T | IMPACT |
//! | IMPACT | 任务完成 | 4·T | FREE |
//!
//! 去抖：守卫条件成立期间累计驻留时间，一旦不成立立即清零；
//! 累计时间严格超过阈值时才发生迁移。驻留时间以 [`Duration`] 整数纳秒累加。

use crate::config::ContactConfig;
use crate::types::Wrench;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// 接触状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContactState {
    #[default]
    Free,
    Hooked,
    Detached,
    Impact,
}

impl ContactState {
    /// 循环中的下一个状态
    pub fn next(self) -> Self {
        match self {
            Self::Free => Self::Hooked,
            Self::Hooked => Self::Detached,
            Self::Detached => Self::Impact,
            Self::Impact => Self::Free,
        }
    }

    /// 是否为升级状态（阻抗向目标值渐变）
    pub fn is_escalated(self) -> bool {
        matches!(self, Self::Hooked | Self::Impact)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Hooked => "HOOKED",
            Self::Detached => "DETACHED",
            Self::Impact => "IMPACT",
        }
    }
}

impl fmt::Display for ContactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态迁移事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactTransition {
    pub from: ContactState,
    pub to: ContactState,
}

/// 单个 tick 的分类输入
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactInputs {
    /// 基坐标系下的接触力（读数无效时为零）
    pub wrench: Wrench,
    /// 外部信号：当前轨迹已执行完毕
    pub trajectory_finished: bool,
    /// 外部信号：任务已完成
    pub task_finished: bool,
}

/// 守卫阈值与各状态去抖时间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactThresholds {
    pub hook_force_low: f64,
    pub hook_force_high: f64,
    pub detach_force_low: f64,
    pub detach_force_high: f64,
    pub hook_debounce: Duration,
    pub detach_debounce: Duration,
    pub impact_debounce: Duration,
    pub release_debounce: Duration,
}

impl ContactThresholds {
    pub fn from_config(config: &ContactConfig) -> Self {
        let scaled = |factor: f64| Duration::from_secs_f64(config.debounce_base * factor);
        Self {
            hook_force_low: config.hook_force_low,
            hook_force_high: config.hook_force_high,
            detach_force_low: config.detach_force_low,
            detach_force_high: config.detach_force_high,
            hook_debounce: scaled(config.hook_debounce_factor),
            detach_debounce: scaled(config.detach_debounce_factor),
            impact_debounce: scaled(config.impact_debounce_factor),
            release_debounce: scaled(config.release_debounce_factor),
        }
    }

    /// 离开某状态所需的去抖时间
    pub fn debounce(&self, state: ContactState) -> Duration {
        match state {
            ContactState::Free => self.hook_debounce,
            ContactState::Hooked => self.detach_debounce,
            ContactState::Detached => self.impact_debounce,
            ContactState::Impact => self.release_debounce,
        }
    }

    /// 某状态的守卫条件
    pub fn guard(&self, state: ContactState, inputs: &ContactInputs) -> bool {
        match state {
            ContactState::Free => {
                let norm = inputs.wrench.norm();
                norm > self.hook_force_low && norm < self.hook_force_high
            },
            ContactState::Hooked => {
                let fz = inputs.wrench.force.z;
                fz > self.detach_force_low && fz < self.detach_force_high
            },
            ContactState::Detached => inputs.trajectory_finished,
            ContactState::Impact => inputs.task_finished,
        }
    }
}

impl Default for ContactThresholds {
    fn default() -> Self {
        Self::from_config(&ContactConfig::default())
    }
}

/// 纯迁移函数：给定守卫结果推进驻留时间
///
/// 返回新的 (状态, 驻留时间)。守卫失败时驻留时间清零；
/// 累计时间严格超过 `debounce` 时迁移到下一状态并清零。
pub fn transition(
    state: ContactState,
    dwell: Duration,
    guard: bool,
    dt: Duration,
    debounce: Duration,
) -> (ContactState, Duration) {
    if !guard {
        return (state, Duration::ZERO);
    }
    let dwell = dwell.saturating_add(dt);
    if dwell > debounce {
        (state.next(), Duration::ZERO)
    } else {
        (state, dwell)
    }
}

/// 接触状态机
#[derive(Debug, Clone)]
pub struct ContactStateMachine {
    state: ContactState,
    dwell: Duration,
    dt: Duration,
    thresholds: ContactThresholds,
}

impl ContactStateMachine {
    /// 创建状态机（初始为 FREE）
    ///
    /// # 参数
    /// - `dt`: 控制周期
    /// - `thresholds`: 守卫阈值与去抖时间
    pub fn new(dt: Duration, thresholds: ContactThresholds) -> Self {
        Self {
            state: ContactState::Free,
            dwell: Duration::ZERO,
            dt,
            thresholds,
        }
    }

    pub fn state(&self) -> ContactState {
        self.state
    }

    /// 当前状态下守卫条件连续成立的时间
    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    pub fn thresholds(&self) -> &ContactThresholds {
        &self.thresholds
    }

    /// 推进一个 tick，发生迁移时返回迁移事件
    pub fn update(&mut self, inputs: &ContactInputs) -> Option<ContactTransition> {
        let from = self.state;
        let guard = self.thresholds.guard(from, inputs);
        let (to, dwell) = transition(
            from,
            self.dwell,
            guard,
            self.dt,
            self.thresholds.debounce(from),
        );
        self.state = to;
        self.dwell = dwell;

        if to != from {
            info!("Contact state transition: {} -> {}", from, to);
            Some(ContactTransition { from, to })
        } else {
            None
        }
    }

    /// 强制回到 FREE（清零驻留时间）
    pub fn reset(&mut self) {
        self.state = ContactState::Free;
        self.dwell = Duration::ZERO;
    }
}
