//! 控制循环
//!
//! [`ControlCore`] 是单个 tick 的纯计算部分（不涉及线程与时间），
//! [`control_loop`] 把它放进固定周期的线程主循环：
//!
//! 1. 等待"新数据"信号（带超时，超时则跳过本 tick）
//! 2. 取出待消费的设定点
//! 3. 力控模式下运行力跟踪律得到期望运动
//! 4. 阻抗调度 → 接触状态机 → 阻抗模型
//! 5. 外部位置修正、工作空间裁剪、逆运动学（失败沿用上一拍命令）
//! 6. 通过钩子发布命令、诊断量与状态迁移，发布观察快照
//! 7. 睡眠到下一个绝对时间锚点

use crate::command::{Diagnostics, JointCommand};
use crate::kinematics::{JointVector, Kinematics};
use crate::state::{ControlContext, ControlSnapshot, KinematicState};
use comply_core::{
    ChannelFilter, CompliantFrame, ContactInputs, ContactStateMachine, ContactThresholds,
    ContactTransition, ControllerConfig, EnergyTank, ForceSetpoint, ForceTrackingLaw,
    GainScheduler, ImpedanceModel, MotionSetpoint, Pose, ProfileTable, Setpoint,
    WorkspaceLimits, WrenchReading,
};
use nalgebra::Vector3;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 单个 tick 的输入
#[derive(Debug, Clone)]
pub struct TickInputs<'a> {
    /// 最新关节状态与末端运动学
    pub kinematic: &'a KinematicState,
    /// 本 tick 的接触力读数
    pub wrench: WrenchReading,
    /// 从设定点槽取出的新设定点
    pub setpoint: Option<Setpoint>,
    pub trajectory_finished: bool,
    pub task_finished: bool,
    /// 外部位置反馈（未接入时为 `None`）
    pub position_feedback: Option<Vector3<f64>>,
    /// 退出力控模式请求
    pub exit_force: bool,
}

/// 单个 tick 的输出
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub command: JointCommand,
    pub diagnostics: Diagnostics,
    pub transition: Option<ContactTransition>,
    pub frame: CompliantFrame,
    pub snapshot: ControlSnapshot,
}

/// 单 tick 控制计算
pub struct ControlCore {
    kinematics: Arc<dyn Kinematics>,
    tick: u64,
    desired: MotionSetpoint,
    force_target: Option<ForceSetpoint>,
    force_law: ForceTrackingLaw,
    impedance: ImpedanceModel,
    scheduler: GainScheduler,
    contact: ContactStateMachine,
    correction: ChannelFilter<3>,
    correction_limit: f64,
    workspace: WorkspaceLimits,
    last_command: JointVector,
}

impl ControlCore {
    /// 以测得的初始构型创建
    ///
    /// 期望位姿初始化为测得位姿（静止），保持命令初始化为测得关节位置。
    pub fn new(
        config: &ControllerConfig,
        kinematics: Arc<dyn Kinematics>,
        initial: &KinematicState,
    ) -> Self {
        let dt = config.control_loop.sample_time;
        let tank = EnergyTank::new(&config.tank, dt);
        Self {
            kinematics,
            tick: 0,
            desired: MotionSetpoint::at_rest(initial.pose),
            force_target: None,
            force_law: ForceTrackingLaw::new(config.force.tracking_gain, dt),
            impedance: ImpedanceModel::new(dt, config.impedance.orientation_compliance),
            scheduler: GainScheduler::new(
                ProfileTable::from_config(&config.impedance),
                config.impedance.ramp_time,
                dt,
                tank,
            ),
            contact: ContactStateMachine::new(
                config.control_loop.period(),
                ContactThresholds::from_config(&config.contact),
            ),
            correction: ChannelFilter::new(dt, config.correction.cutoff_hz),
            correction_limit: config.correction.limit,
            workspace: config.workspace,
            last_command: initial.positions.clone(),
        }
    }

    pub fn desired(&self) -> &MotionSetpoint {
        &self.desired
    }

    pub fn is_force_mode(&self) -> bool {
        self.force_law.is_active()
    }

    pub fn last_command(&self) -> &JointVector {
        &self.last_command
    }

    pub fn scheduler(&self) -> &GainScheduler {
        &self.scheduler
    }

    pub fn contact(&self) -> &ContactStateMachine {
        &self.contact
    }

    pub fn impedance(&self) -> &ImpedanceModel {
        &self.impedance
    }

    /// 执行一个控制周期
    pub fn tick(&mut self, inputs: TickInputs<'_>) -> TickOutput {
        self.tick += 1;

        if inputs.exit_force && self.force_law.is_active() {
            self.leave_force_mode();
        }
        match inputs.setpoint {
            Some(Setpoint::Motion(motion)) => {
                if self.force_law.is_active() {
                    self.leave_force_mode();
                }
                self.desired = motion;
            },
            Some(Setpoint::Force(force)) => {
                if !self.force_law.is_active() {
                    info!("Entering force tracking mode");
                    self.force_law.activate(&self.desired, force.mask);
                }
                self.force_target = Some(force);
            },
            None => {},
        }

        let measured = inputs.wrench.effective();
        if self.force_law.is_active()
            && let Some(target) = self.force_target
        {
            let velocity = inputs.kinematic.twist.to_vector();
            let gains = *self.scheduler.params();
            self.desired = self.force_law.step(&measured, &target, &velocity, &gains);
        }

        let state = self.contact.state();
        let gains = *self
            .scheduler
            .update(state, self.impedance.z(), self.impedance.z_dot());

        let transition = self.contact.update(&ContactInputs {
            wrench: measured,
            trajectory_finished: inputs.trajectory_finished,
            task_finished: inputs.task_finished,
        });

        let frame = self.impedance.step(&inputs.wrench, &gains, &self.desired);

        let correction = match inputs.position_feedback {
            Some(offset) => {
                let filtered = self.correction.update(&[offset.x, offset.y, offset.z]);
                let limit = self.correction_limit;
                Vector3::from(filtered.map(|v| v.clamp(-limit, limit)))
            },
            None => {
                self.correction.reset();
                Vector3::zeros()
            },
        };
        let target = Pose::new(
            self.workspace.clamp(&(frame.pose.position + correction)),
            frame.pose.orientation,
        );

        let seed = if inputs.kinematic.positions.len() == self.last_command.len() {
            &inputs.kinematic.positions
        } else {
            &self.last_command
        };
        let held = match self.kinematics.inverse(seed, &target) {
            Ok(positions) => {
                self.last_command = positions;
                false
            },
            Err(e) => {
                warn!(
                    "Inverse kinematics failed at tick {}: {}, holding previous command",
                    self.tick, e
                );
                true
            },
        };

        let diagnostics = self.impedance.diagnostics();
        let contact_state = self.contact.state();
        let force_mode = self.force_law.is_active();
        TickOutput {
            command: JointCommand {
                tick: self.tick,
                positions: self.last_command.clone(),
                held,
            },
            diagnostics: Diagnostics {
                tick: self.tick,
                admittance_energy: diagnostics.stored_energy,
                extracted_energy: diagnostics.extracted_energy,
                contact_power: diagnostics.net_power,
                tank_energy: self.scheduler.tank().energy(),
                tank_alpha: self.scheduler.alpha(),
                gains,
                contact_state,
                force_mode,
            },
            transition,
            frame,
            snapshot: ControlSnapshot {
                tick: self.tick,
                contact_state,
                desired: self.desired,
                commanded_pose: target,
                gains,
                tank_energy: self.scheduler.tank().energy(),
                force_mode,
            },
        }
    }

    fn leave_force_mode(&mut self) {
        info!("Leaving force tracking mode");
        self.force_law.deactivate();
        self.force_target = None;
        self.desired = MotionSetpoint::at_rest(self.desired.pose);
    }
}

/// 等待启动所需的传感器数据流
///
/// 返回 `false` 表示超时或控制器已停止。
fn wait_for_sensors(ctx: &ControlContext, config: &ControllerConfig) -> bool {
    const POLL: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + config.control_loop.startup_timeout();
    let require_wrench = config.control_loop.require_wrench;

    loop {
        if !ctx.is_running() {
            return false;
        }
        if ctx.has_joint_state() && (!require_wrench || ctx.has_wrench()) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        ctx.new_data.wait_timeout((deadline - now).min(POLL));
    }
}

/// 睡眠到下一个锚点；超周期时告警并重置锚点
fn sleep_until_boundary(ctx: &ControlContext, next_tick: &mut Instant, period: Duration) {
    let now = Instant::now();
    if *next_tick > now {
        spin_sleep::sleep(*next_tick - now);
    } else {
        ctx.metrics.overruns.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Control loop overrun: tick took {:?}, {:?} past its boundary (period {:?})",
            now.duration_since(*next_tick - period),
            now.duration_since(*next_tick),
            period
        );
        *next_tick = now;
    }
}

/// 控制线程主循环
///
/// # 参数
/// - `ctx`: 共享状态上下文
/// - `kinematics`: 运动学协作者
/// - `config`: 已校验的控制器配置
///
/// 启动时等待第一个关节样本（以及配置要求的接触力样本），超时则记录错误、
/// 清除运行标志并退出。之后以 `sample_time` 为周期运行直到 `is_running` 为 `false`。
pub fn control_loop(
    ctx: Arc<ControlContext>,
    kinematics: Arc<dyn Kinematics>,
    config: ControllerConfig,
) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Control thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set control thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    if !wait_for_sensors(&ctx, &config) {
        if ctx.is_running() {
            error!(
                "Required sensor streams did not arrive within {:?}, control loop not started",
                config.control_loop.startup_timeout()
            );
            ctx.shutdown();
        }
        return;
    }

    let initial = ctx.kinematics.load_full();
    let mut core = ControlCore::new(&config, kinematics, &initial);
    ctx.snapshot.store(Arc::new(ControlSnapshot {
        desired: *core.desired(),
        commanded_pose: initial.pose,
        gains: *core.scheduler().params(),
        tank_energy: core.scheduler().tank().energy(),
        ..ControlSnapshot::default()
    }));
    ctx.ready.store(true, Ordering::Release);
    info!(
        "Control loop started at {:.1} Hz",
        1.0 / config.control_loop.sample_time
    );

    let period = config.control_loop.period();
    let data_timeout = config.control_loop.data_timeout();
    let max_norm = config.force.max_wrench_norm;
    let mut next_tick = Instant::now();

    while ctx.is_running() {
        next_tick += period;

        if !ctx.new_data.wait_timeout(data_timeout) {
            if !ctx.is_running() {
                break;
            }
            ctx.metrics.data_timeouts.fetch_add(1, Ordering::Relaxed);
            debug!("No new sensor data within {:?}, tick skipped", data_timeout);
            sleep_until_boundary(&ctx, &mut next_tick, period);
            continue;
        }
        if !ctx.is_running() {
            break;
        }

        let kinematic = ctx.kinematics.load_full();
        let wrench_state = ctx.wrench.load();
        let wrench = if wrench_state.sequence == 0 {
            WrenchReading::NotYetReceived
        } else {
            WrenchReading::classify(wrench_state.wrench, max_norm)
        };
        if wrench == WrenchReading::Malformed {
            ctx.metrics.malformed_wrenches.fetch_add(1, Ordering::Relaxed);
            trace!("Malformed wrench reading treated as zero");
        }

        let setpoint = ctx.setpoints.take();
        if setpoint.is_some() {
            ctx.metrics.setpoints_consumed.fetch_add(1, Ordering::Relaxed);
        }

        let output = core.tick(TickInputs {
            kinematic: &kinematic,
            wrench,
            setpoint,
            trajectory_finished: !ctx.is_trajectory_active(),
            task_finished: ctx.task_done.load(Ordering::Acquire),
            position_feedback: ctx.position_feedback.load_full().map(|f| f.offset),
            exit_force: ctx.exit_force.swap(false, Ordering::AcqRel),
        });

        if output.command.held {
            ctx.metrics.ik_failures.fetch_add(1, Ordering::Relaxed);
        }

        // 非阻塞：注册回调期间跳过本 tick 的发布
        if let Some(hooks) = ctx.hooks.try_read() {
            hooks.trigger_command(&output.command);
            hooks.trigger_diagnostics(&output.diagnostics);
            if let Some(transition) = &output.transition {
                hooks.trigger_transition(transition);
            }
        }
        ctx.snapshot.store(Arc::new(output.snapshot));
        ctx.metrics.ticks.fetch_add(1, Ordering::Relaxed);

        sleep_until_boundary(&ctx, &mut next_tick, period);
    }

    ctx.ready.store(false, Ordering::Release);
    trace!("Control loop exited");
}
