//! 共享状态上下文
//!
//! 传感器回调线程（生产者）与控制线程（消费者）之间的所有共享数据：
//! - 测量快照使用 `ArcSwap` 无锁发布，读者总是拿到最新一份（last-value-wins）
//! - "新数据"信号与设定点槽使用 Mutex + Condvar 的带超时握手
//! - 外部标志位（轨迹占用、任务完成、退出力控）使用原子量
//! - 控制线程每 tick 发布一份 [`ControlSnapshot`] 供观察者读取

use crate::hooks::HookManager;
use crate::kinematics::JointVector;
use crate::metrics::ControlMetrics;
use crate::signal::DataSignal;
use crate::slot::SetpointSlot;
use arc_swap::{ArcSwap, ArcSwapOption};
use comply_core::{
    Accel, ContactState, GainProfile, ImpedanceParams, MotionSetpoint, Pose, Twist, Wrench,
};
use nalgebra::{DMatrix, Vector3};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// 关节状态与由其推导的末端运动学
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicState {
    /// 单调递增序号（0 表示尚未收到）
    pub sequence: u64,
    /// 接收时刻
    pub received_at: Option<Instant>,
    pub positions: JointVector,
    pub velocities: JointVector,
    pub pose: Pose,
    pub twist: Twist,
    /// 数值微分得到的末端加速度
    pub accel: Accel,
    pub jacobian: DMatrix<f64>,
    pub jacobian_rate: DMatrix<f64>,
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            sequence: 0,
            received_at: None,
            positions: JointVector::zeros(0),
            velocities: JointVector::zeros(0),
            pose: Pose::identity(),
            twist: Twist::default(),
            accel: Accel::default(),
            jacobian: DMatrix::zeros(6, 0),
            jacobian_rate: DMatrix::zeros(6, 0),
        }
    }
}

/// 接触力快照（基坐标系，已去偏置与滤波）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WrenchState {
    /// 单调递增序号（0 表示尚未收到）
    pub sequence: u64,
    pub received_at: Option<Instant>,
    pub wrench: Wrench,
}

/// 外部位置反馈
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFeedback {
    pub sequence: u64,
    pub offset: Vector3<f64>,
}

/// 控制线程每 tick 发布的观察快照
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub tick: u64,
    pub contact_state: ContactState,
    pub desired: MotionSetpoint,
    pub commanded_pose: Pose,
    pub gains: ImpedanceParams,
    pub tank_energy: f64,
    pub force_mode: bool,
}

impl Default for ControlSnapshot {
    fn default() -> Self {
        Self {
            tick: 0,
            contact_state: ContactState::Free,
            desired: MotionSetpoint::default(),
            commanded_pose: Pose::identity(),
            gains: GainProfile::uniform(1.0, 1.0, 1.0).params(),
            tank_energy: 0.0,
            force_mode: false,
        }
    }
}

/// 控制器共享上下文
pub struct ControlContext {
    /// 关节与末端运动学（关节回调写，控制线程读）
    pub kinematics: ArcSwap<KinematicState>,
    /// 接触力（力回调写，控制线程读）
    pub wrench: ArcSwap<WrenchState>,
    /// 外部位置反馈（可选数据流）
    pub position_feedback: ArcSwapOption<PositionFeedback>,
    /// 控制线程发布的观察快照
    pub snapshot: ArcSwap<ControlSnapshot>,
    /// "新数据"信号
    pub new_data: DataSignal,
    /// 设定点槽（轨迹分发器 → 控制线程）
    pub setpoints: SetpointSlot,
    /// 是否有轨迹正在执行（分发器独占锁）
    pub trajectory_active: AtomicBool,
    /// 外部信号：任务已完成
    pub task_done: AtomicBool,
    /// 外部请求：退出力控模式
    pub exit_force: AtomicBool,
    /// 控制线程已完成初始化，开始周期运行
    pub ready: AtomicBool,
    /// 运行标志（用于线程生命周期联动）
    pub is_running: AtomicBool,
    /// 运行时回调
    pub hooks: RwLock<HookManager>,
    /// 性能指标
    pub metrics: ControlMetrics,
}

impl ControlContext {
    pub fn new() -> Self {
        Self {
            kinematics: ArcSwap::from_pointee(KinematicState::default()),
            wrench: ArcSwap::from_pointee(WrenchState::default()),
            position_feedback: ArcSwapOption::empty(),
            snapshot: ArcSwap::from_pointee(ControlSnapshot::default()),
            new_data: DataSignal::new(),
            setpoints: SetpointSlot::new(),
            trajectory_active: AtomicBool::new(false),
            task_done: AtomicBool::new(false),
            exit_force: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            is_running: AtomicBool::new(true),
            hooks: RwLock::new(HookManager::new()),
            metrics: ControlMetrics::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 是否已收到第一个关节样本
    pub fn has_joint_state(&self) -> bool {
        self.kinematics.load().sequence > 0
    }

    /// 是否已收到第一个接触力样本
    pub fn has_wrench(&self) -> bool {
        self.wrench.load().sequence > 0
    }

    /// 尝试占用轨迹锁，成功返回 `true`
    pub fn try_acquire_trajectory(&self) -> bool {
        self.trajectory_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release_trajectory(&self) {
        self.trajectory_active.store(false, Ordering::Release);
    }

    pub fn is_trajectory_active(&self) -> bool {
        self.trajectory_active.load(Ordering::Acquire)
    }

    /// 请求停止控制线程
    pub fn shutdown(&self) {
        self.is_running.store(false, Ordering::Release);
        self.new_data.notify();
        self.setpoints.wake_all();
    }
}

impl Default for ControlContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 共享上下文的引用计数句柄
pub type SharedContext = Arc<ControlContext>;

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试轨迹锁互斥
    #[test]
    fn test_trajectory_lock() {
        let ctx = ControlContext::new();
        assert!(ctx.try_acquire_trajectory());
        assert!(!ctx.try_acquire_trajectory());
        assert!(ctx.is_trajectory_active());
        ctx.release_trajectory();
        assert!(ctx.try_acquire_trajectory());
    }

    /// 测试初始状态
    #[test]
    fn test_context_initial_state() {
        let ctx = ControlContext::new();
        assert!(ctx.is_running());
        assert!(!ctx.has_joint_state());
        assert!(!ctx.has_wrench());
        assert!(ctx.position_feedback.load().is_none());
        assert_eq!(ctx.snapshot.load().contact_state, ContactState::Free);
    }

    /// 测试 ArcSwap 快照 last-value-wins
    #[test]
    fn test_wrench_last_value_wins() {
        let ctx = ControlContext::new();
        for i in 1..=3 {
            ctx.wrench.store(Arc::new(WrenchState {
                sequence: i,
                received_at: None,
                wrench: Wrench::new(Vector3::new(i as f64, 0.0, 0.0), Vector3::zeros()),
            }));
        }
        let latest = ctx.wrench.load();
        assert_eq!(latest.sequence, 3);
        assert_eq!(latest.wrench.force.x, 3.0);
    }
}
