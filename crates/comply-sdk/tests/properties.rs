//! 算法层的属性测试
//!
//! 使用 proptest 验证能量罐、调度器、阻抗模型与接触状态机的不变量。

use comply_sdk::control::contact::transition;
use comply_sdk::control::{
    ContactState, EnergyTank, GainProfile, GainScheduler, ImpedanceModel, ImpedanceParams,
    MotionSetpoint, Pose, ProfileTable, TankConfig, Vector6, Wrench, WrenchReading,
};
use nalgebra::{UnitQuaternion, Vector3};
use proptest::prelude::*;
use std::time::Duration;

const DT: f64 = 0.01;

fn tank_config(initial: f64) -> TankConfig {
    TankConfig {
        initial_energy: initial,
        min_energy: 0.01,
        max_energy: 0.5,
        eta: 0.8,
    }
}

fn table() -> ProfileTable {
    ProfileTable {
        nominal: GainProfile::uniform(1.0, 15.0, 13.0).params(),
        hooked: GainProfile::uniform(3.0, 30.0, 40.0).params(),
        impact: GainProfile::uniform(30.0, 800.0, 400.0).params(),
    }
}

fn state_from(index: u8) -> ContactState {
    match index % 4 {
        0 => ContactState::Free,
        1 => ContactState::Hooked,
        2 => ContactState::Detached,
        _ => ContactState::Impact,
    }
}

fn within(value: f64, bounds: &[f64]) -> bool {
    let lo = bounds.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = bounds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    value >= lo - 1e-9 && value <= hi + 1e-9
}

proptest! {
    /// 测试任意输入序列下罐能量始终在 [0, E_max] 内
    #[test]
    fn tank_energy_bounded(
        initial in 0.0..0.5f64,
        steps in prop::collection::vec((-5.0..5.0f64, 0.0..5.0f64), 1..200),
    ) {
        let mut tank = EnergyTank::new(&tank_config(initial), DT);
        for (input, dissipation) in steps {
            let alpha = tank.update(&[input], &[dissipation])[0];
            prop_assert!((0.0..=1.0).contains(&alpha));
            prop_assert!(tank.energy() >= 0.0);
            prop_assert!(tank.energy() <= tank.max_energy() + 1e-12);
        }
    }

    /// 测试只有耗散输入时罐能量单调不减
    #[test]
    fn tank_energy_non_decreasing_without_draw(
        initial in 0.0..0.5f64,
        dissipations in prop::collection::vec(0.0..2.0f64, 1..200),
    ) {
        let mut tank = EnergyTank::new(&tank_config(initial), DT);
        let mut previous = tank.energy();
        for d in dissipations {
            tank.update(&[0.0], &[d]);
            prop_assert!(tank.energy() >= previous - 1e-12);
            previous = tank.energy();
        }
    }

    /// 测试激活函数随储能单调不减
    #[test]
    fn tank_activation_monotonic(a in 0.0..0.5f64, b in 0.0..0.5f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let low = EnergyTank::new(&tank_config(lo), DT).activation();
        let high = EnergyTank::new(&tank_config(hi), DT).activation();
        prop_assert!(low <= high + 1e-12);
    }

    /// 测试调度参数始终落在名义值与目标值围成的区间内，且每步变化不超过渐变速率
    #[test]
    fn scheduler_stays_in_hull(
        states in prop::collection::vec(0u8..4, 1..300),
        z in -0.05..0.05f64,
        z_dot in -0.2..0.2f64,
    ) {
        let table = table();
        let ramp_time = 0.5;
        let mut scheduler = GainScheduler::new(
            table,
            ramp_time,
            DT,
            EnergyTank::new(&tank_config(0.5), DT),
        );
        let z = Vector6::repeat(z);
        let z_dot = Vector6::repeat(z_dot);
        let max_step = |pick: fn(&ImpedanceParams) -> f64| {
            let spans = [
                (pick(&table.hooked) - pick(&table.nominal)).abs(),
                (pick(&table.impact) - pick(&table.nominal)).abs(),
            ];
            spans[0].max(spans[1]) / ramp_time * DT + 1e-9
        };

        for index in states {
            let before = *scheduler.params();
            let after = *scheduler.update(state_from(index), &z, &z_dot);
            for i in 0..6 {
                prop_assert!(within(after.mass[i], &[1.0, 3.0, 30.0]));
                prop_assert!(within(after.damping[i], &[15.0, 30.0, 800.0]));
                prop_assert!(within(after.stiffness[i], &[13.0, 40.0, 400.0]));
                prop_assert!((after.mass[i] - before.mass[i]).abs() <= max_step(|p| p.mass[0]));
                prop_assert!(
                    (after.damping[i] - before.damping[i]).abs() <= max_step(|p| p.damping[0])
                );
                prop_assert!(
                    (after.stiffness[i] - before.stiffness[i]).abs()
                        <= max_step(|p| p.stiffness[0])
                );
            }
            prop_assert!((0.0..=1.0).contains(&scheduler.alpha()));
        }
    }

    /// 测试零外力、零初值时柔顺坐标系等于任意设定点
    #[test]
    fn impedance_zero_force_identity(
        x in -1.0..1.0f64,
        y in -1.0..1.0f64,
        zc in -1.0..1.0f64,
        roll in -3.0..3.0f64,
        pitch in -1.5..1.5f64,
        yaw in -3.0..3.0f64,
        steps in 1usize..100,
    ) {
        let params = GainProfile::uniform(1.0, 15.0, 13.0).params();
        let setpoint = MotionSetpoint::at_rest(Pose::new(
            Vector3::new(x, y, zc),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        ));
        let mut model = ImpedanceModel::new(DT, true);
        for _ in 0..steps {
            let frame = model.step(&WrenchReading::Valid(Wrench::zero()), &params, &setpoint);
            prop_assert!((frame.pose.position - setpoint.pose.position).norm() < 1e-12);
            prop_assert!(frame.pose.orientation.angle_to(&setpoint.pose.orientation) < 1e-6);
        }
    }

    /// 测试任意外力下输出姿态始终为单位四元数
    #[test]
    fn impedance_orientation_unit_norm(
        torques in prop::collection::vec((-5.0..5.0f64, -5.0..5.0f64, -5.0..5.0f64), 1..200),
    ) {
        let params = GainProfile::uniform(1.0, 15.0, 13.0).params();
        let setpoint = MotionSetpoint::at_rest(Pose::identity());
        let mut model = ImpedanceModel::new(DT, true);
        for (tx, ty, tz) in torques {
            let reading = WrenchReading::Valid(Wrench::new(Vector3::zeros(), Vector3::new(tx, ty, tz)));
            let frame = model.step(&reading, &params, &setpoint);
            prop_assert!((frame.pose.orientation.quaternion().norm() - 1.0).abs() < 1e-9);
            prop_assert!(frame.pose.is_finite());
        }
    }

    /// 测试去抖：守卫连续成立 n 个 tick 后迁移当且仅当 n·dt > 去抖时间
    #[test]
    fn contact_debounce_threshold(ticks in 1u32..400, debounce_ms in 10u64..3000) {
        let dt = Duration::from_millis(10);
        let debounce = Duration::from_millis(debounce_ms);
        let mut state = ContactState::Free;
        let mut dwell = Duration::ZERO;
        let mut moved_at = None;
        for n in 1..=ticks {
            let (next, next_dwell) = transition(state, dwell, true, dt, debounce);
            if next != state && moved_at.is_none() {
                moved_at = Some(n);
            }
            state = next;
            dwell = next_dwell;
            if moved_at.is_some() {
                break;
            }
        }
        match moved_at {
            Some(n) => {
                prop_assert!(dt * n > debounce);
                prop_assert!(dt * (n - 1) <= debounce);
                prop_assert_eq!(state, ContactState::Hooked);
            },
            None => prop_assert!(dt * ticks <= debounce),
        }
    }

    /// 测试守卫中断后驻留时间清零
    #[test]
    fn contact_guard_break_resets_dwell(before in 1u32..50, debounce_ms in 600u64..2000) {
        let dt = Duration::from_millis(10);
        let debounce = Duration::from_millis(debounce_ms);
        let mut dwell = Duration::ZERO;
        let mut state = ContactState::Free;
        for _ in 0..before {
            (state, dwell) = transition(state, dwell, true, dt, debounce);
        }
        prop_assert_eq!(state, ContactState::Free);
        let (state, dwell) = transition(state, dwell, false, dt, debounce);
        prop_assert_eq!(state, ContactState::Free);
        prop_assert_eq!(dwell, Duration::ZERO);
    }
}
