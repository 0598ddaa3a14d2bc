//! 闭环仿真命令
//!
//! 仿真机器人按关节命令理想跟踪，六维力传感器带固定偏置与均匀噪声。
//! 接触力按剧本分阶段施加，依次驱动 FREE → HOOKED → DETACHED → IMPACT → FREE：
//!
//! | 阶段 | 施加的力 | 外部信号 |
//! |---|---|---|
//! | free | 0 | - |
//! | hook | F_x = `--contact-force` | - |
//! | detach | F_z 取脱离区间中点 | - |
//! | impact | 0 | 无轨迹，轨迹视为已完成 |
//! | release | 0 | 任务完成 |
//! | idle | 0 | - |

use super::config::load_or_default;
use anyhow::{Context, Result};
use clap::Args;
use comply_sdk::control::ContactThresholds;
use comply_sdk::driver::{ChannelHook, HookReceivers, JointVector, MetricsSnapshot};
use comply_sdk::{
    CartesianKinematics, ContactTransition, Controller, ControllerBuilder, ControllerConfig,
    Diagnostics, JointCommand, Kinematics, Pose, Wrench,
};
use crossbeam_channel::Receiver;
use nalgebra::Vector3;
use rand::Rng;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 传感器零偏（牛）
const SENSOR_BIAS: [f64; 3] = [0.3, -0.2, 0.5];
/// 各阶段在去抖时间之外的余量（秒）
const PHASE_MARGIN: f64 = 1.0;

/// 仿真参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 配置文件（缺省为默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 仿真时长（秒），缺省为剧本总时长
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// 挂接阶段的接触力（牛）
    #[arg(long, default_value_t = 1.0)]
    pub contact_force: f64,

    /// 力传感器噪声幅值（牛）
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// 每隔多少个 tick 输出一次诊断
    #[arg(long, default_value_t = 50)]
    pub every: u64,

    /// 以 JSON 行输出
    #[arg(long)]
    pub json: bool,

    /// URDF 文件（缺省使用笛卡尔虚拟臂）
    #[cfg(feature = "urdf")]
    #[arg(long)]
    pub urdf: Option<PathBuf>,

    /// URDF 链的末端关节名
    #[cfg(feature = "urdf")]
    #[arg(long, default_value = "joint6")]
    pub end_joint: String,
}

/// 剧本中的一个阶段
#[derive(Debug, Clone, Copy)]
struct Phase {
    name: &'static str,
    /// 阶段结束时刻（从仿真开始计，秒）
    until: f64,
    wrench: Wrench,
    task_done: bool,
}

/// 按去抖时间生成接触剧本
fn script(config: &ControllerConfig, contact_force: f64) -> Vec<Phase> {
    let thresholds = ContactThresholds::from_config(&config.contact);
    let calibration = config.force.bias_samples as f64 * config.force.sensor_sample_time;
    let detach_fz = 0.5 * (config.contact.detach_force_low + config.contact.detach_force_high);

    let steps = [
        ("free", calibration + PHASE_MARGIN, Wrench::zero(), false),
        (
            "hook",
            thresholds.hook_debounce.as_secs_f64() + PHASE_MARGIN,
            Wrench::new(Vector3::new(contact_force, 0.0, 0.0), Vector3::zeros()),
            false,
        ),
        (
            "detach",
            thresholds.detach_debounce.as_secs_f64() + PHASE_MARGIN,
            Wrench::new(Vector3::new(0.0, 0.0, detach_fz), Vector3::zeros()),
            false,
        ),
        ("impact", thresholds.impact_debounce.as_secs_f64() + PHASE_MARGIN, Wrench::zero(), false),
        ("release", thresholds.release_debounce.as_secs_f64() + PHASE_MARGIN, Wrench::zero(), true),
        ("idle", PHASE_MARGIN, Wrench::zero(), false),
    ];

    let mut until = 0.0;
    steps
        .into_iter()
        .map(|(name, length, wrench, task_done)| {
            until += length;
            Phase {
                name,
                until,
                wrench,
                task_done,
            }
        })
        .collect()
}

/// 给定时刻所处的阶段（超出剧本时停在最后一段）
fn phase_at(script: &[Phase], t: f64) -> Option<&Phase> {
    script.iter().find(|p| t < p.until).or(script.last())
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = load_or_default(self.config.as_deref())?;
        let script = script(&config, self.contact_force);
        let duration = match self.duration {
            Some(d) => d,
            None => script.last().map(|p| p.until).unwrap_or(0.0),
        };
        let (kinematics, home) = self.kinematics()?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        ctrlc::set_handler(move || {
            flag.store(false, Ordering::Release);
        })
        .context("failed to install Ctrl-C handler")?;

        let (hook, rx) = ChannelHook::new(4096);
        let HookReceivers {
            commands,
            diagnostics,
            transitions,
        } = rx;
        let joint_period = Duration::from_secs_f64(config.control_loop.joint_sample_time);
        let controller = ControllerBuilder::new(kinematics)
            .config(config)
            .hook(Arc::new(hook))
            .build()?;
        info!("Simulating {:.1} s ({} phases)", duration, script.len());

        let start = Instant::now();
        thread::scope(|scope| {
            let sensor = SimulatedRobot {
                controller: &controller,
                script: &script,
                commands,
                noise: self.noise.abs(),
                period: joint_period,
                running: &running,
                start,
            };
            scope.spawn(move || sensor.run(home));

            self.report(&controller, &diagnostics, &transitions, &running, start, duration);
            running.store(false, Ordering::Release);
        });

        self.summary(&controller.metrics());
        Ok(())
    }

    fn kinematics(&self) -> Result<(Arc<dyn Kinematics>, JointVector)> {
        #[cfg(feature = "urdf")]
        if let Some(path) = &self.urdf {
            let arm: Arc<dyn Kinematics> =
                Arc::new(comply_sdk::UrdfKinematics::from_urdf_file(path, &self.end_joint)?);
            let home = JointVector::zeros(arm.dof());
            return Ok((arm, home));
        }
        let arm: Arc<dyn Kinematics> = Arc::new(CartesianKinematics::new());
        let home = CartesianKinematics::joints_for(&Pose::from_translation(0.3, 0.0, 0.3));
        Ok((arm, home))
    }

    fn report(
        &self,
        controller: &Controller,
        diagnostics: &Receiver<Diagnostics>,
        transitions: &Receiver<ContactTransition>,
        running: &AtomicBool,
        start: Instant,
        duration: f64,
    ) {
        let every = self.every.max(1);
        while running.load(Ordering::Acquire) && start.elapsed().as_secs_f64() < duration {
            if !controller.is_healthy() {
                error!("Control loop is not running");
                break;
            }
            let t = start.elapsed().as_secs_f64();
            for transition in transitions.try_iter() {
                self.print_transition(t, &transition);
            }
            if let Ok(diag) = diagnostics.recv_timeout(Duration::from_millis(50))
                && diag.tick % every == 0
            {
                self.print_diagnostics(t, &diag);
            }
        }
        for transition in transitions.try_iter() {
            self.print_transition(start.elapsed().as_secs_f64(), &transition);
        }
    }

    fn print_transition(&self, t: f64, transition: &ContactTransition) {
        if self.json {
            println!(
                "{}",
                json!({
                    "type": "transition",
                    "t": t,
                    "from": transition.from.as_str(),
                    "to": transition.to.as_str(),
                })
            );
        } else {
            println!(">>> [{:7.2} s] {} -> {}", t, transition.from, transition.to);
        }
    }

    fn print_diagnostics(&self, t: f64, diag: &Diagnostics) {
        let g = &diag.gains;
        if self.json {
            println!(
                "{}",
                json!({
                    "type": "diagnostics",
                    "t": t,
                    "tick": diag.tick,
                    "state": diag.contact_state.as_str(),
                    "force_mode": diag.force_mode,
                    "tank_energy": diag.tank_energy,
                    "tank_alpha": diag.tank_alpha,
                    "admittance_energy": diag.admittance_energy,
                    "extracted_energy": diag.extracted_energy,
                    "contact_power": diag.contact_power,
                    "mass": g.mass.as_slice(),
                    "damping": g.damping.as_slice(),
                    "stiffness": g.stiffness.as_slice(),
                })
            );
        } else {
            println!(
                "[{:7.2} s] tick {:6} {:8} E_tank={:.4} alpha={:.3} M={:.2} D={:.1} K={:.1} E_adm={:.5}",
                t,
                diag.tick,
                diag.contact_state.as_str(),
                diag.tank_energy,
                diag.tank_alpha,
                g.mass[0],
                g.damping[0],
                g.stiffness[0],
                diag.admittance_energy
            );
        }
    }

    fn summary(&self, metrics: &MetricsSnapshot) {
        if self.json {
            println!(
                "{}",
                json!({
                    "type": "summary",
                    "ticks": metrics.ticks,
                    "overruns": metrics.overruns,
                    "data_timeouts": metrics.data_timeouts,
                    "ik_failures": metrics.ik_failures,
                    "malformed_wrenches": metrics.malformed_wrenches,
                    "fk_failures": metrics.fk_failures,
                })
            );
        } else {
            println!("📊 Control loop summary:");
            println!("   ticks:              {}", metrics.ticks);
            println!("   overruns:           {}", metrics.overruns);
            println!("   data timeouts:      {}", metrics.data_timeouts);
            println!("   IK failures:        {}", metrics.ik_failures);
            println!("   malformed wrenches: {}", metrics.malformed_wrenches);
            println!("   FK failures:        {}", metrics.fk_failures);
        }
    }
}

/// 理想跟踪的仿真机器人与力传感器
struct SimulatedRobot<'a> {
    controller: &'a Controller,
    script: &'a [Phase],
    commands: Receiver<JointCommand>,
    noise: f64,
    period: Duration,
    running: &'a AtomicBool,
    start: Instant,
}

impl SimulatedRobot<'_> {
    fn run(self, home: JointVector) {
        let sensors = self.controller.sensors();
        let mut rng = rand::thread_rng();
        let dt = self.period.as_secs_f64();
        let bias = Vector3::from(SENSOR_BIAS);
        let mut q = home;
        let mut current_phase = "";

        while self.running.load(Ordering::Acquire) {
            let previous = q.clone();
            if let Some(command) = self.commands.try_iter().last() {
                q = command.positions;
            }
            let qd = (&q - &previous) / dt;
            if let Err(e) = sensors.on_joint_state(q.as_slice(), qd.as_slice()) {
                warn!("Simulated joint sample rejected: {}", e);
            }

            let t = self.start.elapsed().as_secs_f64();
            if let Some(phase) = phase_at(self.script, t) {
                if phase.name != current_phase {
                    info!("Contact script phase: {}", phase.name);
                    current_phase = phase.name;
                }
                self.controller.set_task_done(phase.task_done);

                let noise = Vector3::from_fn(|_, _| rng.gen_range(-self.noise..=self.noise));
                let raw = Wrench::new(phase.wrench.force + bias + noise, phase.wrench.torque);
                sensors.on_force_torque(raw);
            }

            thread::sleep(self.period);
        }
    }
}
