//! 阻抗参数调度器
//!
//! 按接触状态选择目标参数：升级状态（HOOKED/IMPACT）向目标值渐变，
//! 去升级状态（FREE/DETACHED）向名义值渐变。每个对角元的渐变速率为
//! `|X_target − X_nominal| / T_ramp`，并经能量罐门控：
//!
//! - 罐输入功率 p = 0.5·zᵀK̇z + 0.5·żᵀṀż
//! - 罐耗散 żᵀDż
//! - K̇、Ṁ 乘以罐返回的 alpha；D 的变化不经门控（只增加耗散）
//!
//! 任何对角元都不会越过渐变终点，因而始终落在名义值与各目标值围成的区间内。

use crate::config::ImpedanceConfig;
use crate::contact::ContactState;
use crate::impedance::ImpedanceParams;
use crate::tank::EnergyTank;
use crate::types::Vector6;
use tracing::debug;

/// 各状态的目标参数表
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileTable {
    pub nominal: ImpedanceParams,
    pub hooked: ImpedanceParams,
    pub impact: ImpedanceParams,
}

impl ProfileTable {
    pub fn from_config(config: &ImpedanceConfig) -> Self {
        Self {
            nominal: config.nominal.params(),
            hooked: config.hooked.params(),
            impact: config.impact.params(),
        }
    }

    /// 升级状态的目标参数；去升级状态返回 `None`
    pub fn target(&self, state: ContactState) -> Option<&ImpedanceParams> {
        match state {
            ContactState::Hooked => Some(&self.hooked),
            ContactState::Impact => Some(&self.impact),
            ContactState::Free | ContactState::Detached => None,
        }
    }
}

/// 单个对角元的渐变速率
///
/// 朝 `goal` 方向，速度为 |span|/T；span 为 0 时按剩余距离在 T 内走完。
fn ramp_rate(current: f64, goal: f64, span: f64, ramp_time: f64) -> f64 {
    let gap = goal - current;
    if gap == 0.0 {
        return 0.0;
    }
    let distance = if span != 0.0 { span.abs() } else { gap.abs() };
    let speed = distance / ramp_time;
    speed.copysign(gap)
}

/// 推进一步并裁剪到终点，不越过 goal
fn advance(current: f64, goal: f64, rate: f64, dt: f64) -> f64 {
    let next = current + rate * dt;
    if (goal - next) * (goal - current) <= 0.0 {
        goal
    } else {
        next
    }
}

/// 阻抗参数调度器
#[derive(Debug, Clone)]
pub struct GainScheduler {
    table: ProfileTable,
    current: ImpedanceParams,
    /// 最近一次升级的目标，去升级时用于计算速率
    last_target: ImpedanceParams,
    ramp_time: f64,
    dt: f64,
    tank: EnergyTank,
    alpha: f64,
    rates: ImpedanceParams,
}

impl GainScheduler {
    /// 创建调度器（初始参数为名义值）
    pub fn new(table: ProfileTable, ramp_time: f64, dt: f64, tank: EnergyTank) -> Self {
        let zero = Vector6::zeros();
        Self {
            current: table.nominal,
            last_target: table.nominal,
            table,
            ramp_time,
            dt,
            tank,
            alpha: 1.0,
            rates: ImpedanceParams::new(zero, zero, zero),
        }
    }

    /// 当前阻抗参数
    pub fn params(&self) -> &ImpedanceParams {
        &self.current
    }

    pub fn table(&self) -> &ProfileTable {
        &self.table
    }

    pub fn tank(&self) -> &EnergyTank {
        &self.tank
    }

    /// 最近一次罐门控系数
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// 最近一次实际应用的变化率（已门控）
    pub fn rates(&self) -> &ImpedanceParams {
        &self.rates
    }

    /// 推进一步
    ///
    /// # 参数
    /// - `state`: 当前接触状态
    /// - `z`, `z_dot`: 阻抗模型当前的柔顺偏移与速度
    pub fn update(&mut self, state: ContactState, z: &Vector6, z_dot: &Vector6) -> &ImpedanceParams {
        let (goal, span_from) = match self.table.target(state) {
            Some(target) => {
                if *target != self.last_target {
                    debug!("Gain scheduler escalating toward {} profile", state);
                    self.last_target = *target;
                }
                (*target, self.table.nominal)
            },
            None => (self.table.nominal, self.last_target),
        };

        let mut rates = ImpedanceParams::new(Vector6::zeros(), Vector6::zeros(), Vector6::zeros());
        for i in 0..6 {
            rates.mass[i] = ramp_rate(
                self.current.mass[i],
                goal.mass[i],
                goal.mass[i] - span_from.mass[i],
                self.ramp_time,
            );
            rates.damping[i] = ramp_rate(
                self.current.damping[i],
                goal.damping[i],
                goal.damping[i] - span_from.damping[i],
                self.ramp_time,
            );
            rates.stiffness[i] = ramp_rate(
                self.current.stiffness[i],
                goal.stiffness[i],
                goal.stiffness[i] - span_from.stiffness[i],
                self.ramp_time,
            );
        }

        let power = 0.5 * z.dot(&rates.stiffness.component_mul(z))
            + 0.5 * z_dot.dot(&rates.mass.component_mul(z_dot));
        let dissipation = z_dot.dot(&self.current.damping.component_mul(z_dot));
        self.alpha = self.tank.update(&[power], &[dissipation])[0];
        rates.stiffness *= self.alpha;
        rates.mass *= self.alpha;

        for i in 0..6 {
            self.current.mass[i] = advance(self.current.mass[i], goal.mass[i], rates.mass[i], self.dt);
            self.current.damping[i] =
                advance(self.current.damping[i], goal.damping[i], rates.damping[i], self.dt);
            self.current.stiffness[i] = advance(
                self.current.stiffness[i],
                goal.stiffness[i],
                rates.stiffness[i],
                self.dt,
            );
        }
        self.rates = rates;
        &self.current
    }
}
