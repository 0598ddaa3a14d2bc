//! 轨迹分发器
//!
//! 同一时刻最多执行一条轨迹。[`TrajectoryDispatcher::submit`] 同步地占用轨迹锁
//! （忙时立即返回 [`DispatchError::Busy`]，不影响正在执行的轨迹），然后在工作线程中
//! 按控制周期把插值点逐个写入设定点槽：上一个点被控制线程取走后才写下一个。
//!
//! 最后一个点被控制线程取走后轨迹才算完成。取消在下一个点边界生效；
//! 无论正常结束、取消还是控制器停止，轨迹锁都会释放。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use comply_client::{TrajectoryDispatcher, TrajectoryRequest};
//! use comply_core::Pose;
//! # fn demo(controller: &comply_driver::Controller) -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = TrajectoryDispatcher::new(controller);
//! let handle = dispatcher.submit(TrajectoryRequest::move_to(
//!     controller.desired_pose(),
//!     Pose::from_translation(0.4, 0.0, 0.3),
//!     2.0,
//! ))?;
//! for percent in handle.feedback().iter() {
//!     println!("{percent:.0}%");
//! }
//! let result = handle.wait()?;
//! assert!(result.ok);
//! # Ok(())
//! # }
//! ```

use crate::planner::{SetpointStream, plan};
use crate::request::{PlanError, TrajectoryRequest};
use comply_driver::{ControlContext, Controller};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// 分发错误
#[derive(Error, Debug)]
pub enum DispatchError {
    /// 已有轨迹在执行
    #[error("Another trajectory is already active")]
    Busy,

    /// 请求非法
    #[error("Invalid trajectory request: {0}")]
    InvalidRequest(#[from] PlanError),

    /// 控制器已停止
    #[error("Controller is not running")]
    NotRunning,

    /// 工作线程创建失败
    #[error("Failed to spawn trajectory worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// 工作线程 panic
    #[error("Trajectory worker panicked")]
    WorkerPanicked,
}

/// 轨迹执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrajectoryResult {
    /// 全部点都已被控制线程取走
    pub ok: bool,
    /// 已写入的点数
    pub points_sent: usize,
    pub total_points: usize,
}

/// 轨迹锁（RAII，离开作用域时释放）
struct TrajectoryLock {
    ctx: Arc<ControlContext>,
}

impl TrajectoryLock {
    fn acquire(ctx: &Arc<ControlContext>) -> Option<Self> {
        ctx.try_acquire_trajectory().then(|| Self { ctx: ctx.clone() })
    }
}

impl Drop for TrajectoryLock {
    fn drop(&mut self) {
        self.ctx.release_trajectory();
        debug!("Trajectory lock released");
    }
}

/// 执行中轨迹的句柄
///
/// 丢弃句柄不会取消轨迹；需要中止时调用 [`TrajectoryHandle::cancel`]。
pub struct TrajectoryHandle {
    cancel: Arc<AtomicBool>,
    feedback: Receiver<f64>,
    worker: JoinHandle<TrajectoryResult>,
    total_points: usize,
}

impl TrajectoryHandle {
    /// 请求取消（下一个点边界生效）
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// 完成百分比（0–100）流，轨迹结束后断开
    pub fn feedback(&self) -> &Receiver<f64> {
        &self.feedback
    }

    /// 取出目前为止最新的完成百分比
    pub fn latest_progress(&self) -> Option<f64> {
        self.feedback.try_iter().last()
    }

    pub fn total_points(&self) -> usize {
        self.total_points
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// 等待轨迹结束
    pub fn wait(self) -> Result<TrajectoryResult, DispatchError> {
        self.worker.join().map_err(|_| DispatchError::WorkerPanicked)
    }
}

/// 轨迹分发器
#[derive(Clone)]
pub struct TrajectoryDispatcher {
    ctx: Arc<ControlContext>,
    sample_time: f64,
}

impl TrajectoryDispatcher {
    /// 绑定到控制器（按其控制周期采样）
    pub fn new(controller: &Controller) -> Self {
        Self::from_context(
            controller.context().clone(),
            controller.config().control_loop.sample_time,
        )
    }

    /// 直接绑定共享上下文
    pub fn from_context(ctx: Arc<ControlContext>, sample_time: f64) -> Self {
        Self { ctx, sample_time }
    }

    /// 是否有轨迹正在执行
    pub fn is_busy(&self) -> bool {
        self.ctx.is_trajectory_active()
    }

    /// 提交轨迹
    ///
    /// # 错误
    /// - `NotRunning`: 控制器已停止
    /// - `Busy`: 已有轨迹在执行（正在执行的轨迹不受影响）
    /// - `InvalidRequest`: 请求校验或插值失败（轨迹锁已释放）
    /// - `Spawn`: 工作线程创建失败（轨迹锁已释放）
    pub fn submit(&self, request: TrajectoryRequest) -> Result<TrajectoryHandle, DispatchError> {
        if !self.ctx.is_running() {
            return Err(DispatchError::NotRunning);
        }
        let Some(lock) = TrajectoryLock::acquire(&self.ctx) else {
            info!("Trajectory rejected: another trajectory is active");
            return Err(DispatchError::Busy);
        };

        let (points, total_points) = plan(&request, self.sample_time).inspect_err(|e| {
            warn!("Trajectory rejected: {}", e);
        })?;

        let cancel = Arc::new(AtomicBool::new(false));
        let (feedback_tx, feedback_rx) = unbounded();
        let worker = Worker {
            ctx: self.ctx.clone(),
            cancel: cancel.clone(),
            feedback: feedback_tx,
            poll: Duration::from_secs_f64(self.sample_time),
            total_points,
        };

        let mode = if request.is_force() { "force" } else { "pose" };
        let worker = std::thread::Builder::new()
            .name("comply-trajectory".to_string())
            .spawn(move || worker.run(points, lock))
            .map_err(DispatchError::Spawn)?;
        info!(
            "Trajectory accepted: {} mode, {} waypoints, {} points over {:.3} s",
            mode,
            request.len(),
            total_points,
            request.duration()
        );

        Ok(TrajectoryHandle {
            cancel,
            feedback: feedback_rx,
            worker,
            total_points,
        })
    }
}

struct Worker {
    ctx: Arc<ControlContext>,
    cancel: Arc<AtomicBool>,
    feedback: Sender<f64>,
    poll: Duration,
    total_points: usize,
}

impl Worker {
    fn run(self, points: SetpointStream, _lock: TrajectoryLock) -> TrajectoryResult {
        let mut points_sent = 0;
        for point in points {
            let mut pending = point;
            loop {
                if let Some(aborted) = self.interrupted(points_sent) {
                    return aborted;
                }
                match self.ctx.setpoints.put_timeout(pending, self.poll) {
                    Ok(()) => break,
                    Err(returned) => pending = returned,
                }
            }
            points_sent += 1;
            let progress = 100.0 * points_sent as f64 / self.total_points as f64;
            if self.feedback.send(progress).is_err() {
                trace!("Progress receiver dropped ({:.1}%)", progress);
            }
        }

        // 最后一个点被取走前保持轨迹锁
        while !self.ctx.setpoints.wait_drained(self.poll) {
            if let Some(aborted) = self.interrupted(points_sent) {
                return aborted;
            }
        }
        info!("Trajectory finished ({} points)", points_sent);
        self.result(true, points_sent)
    }

    fn interrupted(&self, points_sent: usize) -> Option<TrajectoryResult> {
        if self.cancel.load(Ordering::Acquire) {
            info!(
                "Trajectory cancelled after {}/{} points",
                points_sent, self.total_points
            );
            return Some(self.result(false, points_sent));
        }
        if !self.ctx.is_running() {
            warn!("Controller stopped, trajectory aborted");
            return Some(self.result(false, points_sent));
        }
        None
    }

    fn result(&self, ok: bool, points_sent: usize) -> TrajectoryResult {
        TrajectoryResult {
            ok,
            points_sent,
            total_points: self.total_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comply_core::{AxisMask, Pose, Setpoint, Wrench};
    use nalgebra::Vector3;
    use std::thread;
    use std::time::Instant;

    fn request(duration: f64) -> TrajectoryRequest {
        TrajectoryRequest::move_to(
            Pose::from_translation(0.3, 0.0, 0.3),
            Pose::from_translation(0.4, 0.0, 0.3),
            duration,
        )
    }

    /// 模拟控制线程：每 `period` 取走一个点
    fn consumer(ctx: Arc<ControlContext>, period: Duration) -> JoinHandle<Vec<Setpoint>> {
        thread::spawn(move || {
            let mut taken = Vec::new();
            while ctx.is_running() {
                if let Some(point) = ctx.setpoints.take() {
                    taken.push(point);
                }
                thread::sleep(period);
            }
            taken
        })
    }

    /// 测试轨迹完整执行，反馈到达 100%
    #[test]
    fn test_trajectory_completes() {
        let ctx = Arc::new(ControlContext::new());
        let reader = consumer(ctx.clone(), Duration::from_millis(1));
        let dispatcher = TrajectoryDispatcher::from_context(ctx.clone(), 0.001);

        let handle = dispatcher.submit(request(0.05)).unwrap();
        assert_eq!(handle.total_points(), 51);
        let progress: Vec<f64> = handle.feedback().iter().collect();
        let result = handle.wait().unwrap();

        assert!(result.ok);
        assert_eq!(result.points_sent, 51);
        assert_eq!(progress.len(), 51);
        assert!((progress[50] - 100.0).abs() < 1e-9);
        assert!(progress.windows(2).all(|w| w[1] > w[0]));
        assert!(!dispatcher.is_busy());
        assert!(ctx.setpoints.is_empty());

        ctx.shutdown();
        let taken = reader.join().unwrap();
        assert_eq!(taken.len(), 51);
        match taken[50] {
            Setpoint::Motion(m) => assert!((m.pose.position.x - 0.4).abs() < 1e-12),
            Setpoint::Force(_) => panic!("expected pose setpoint"),
        }
    }

    /// 测试最后一个点被取走前轨迹锁不释放
    #[test]
    fn test_lock_held_until_last_point_taken() {
        let ctx = Arc::new(ControlContext::new());
        let dispatcher = TrajectoryDispatcher::from_context(ctx.clone(), 0.01);
        let handle = dispatcher.submit(request(0.02)).unwrap();
        let total = handle.total_points();

        // 手动逐个取点，留下最后一个
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut taken = 0;
        while taken < total - 1 && Instant::now() < deadline {
            if ctx.setpoints.take().is_some() {
                taken += 1;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(taken, total - 1);
        while ctx.setpoints.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.latest_progress(), Some(100.0));
        assert!(dispatcher.is_busy());
        assert!(!handle.is_finished());

        assert!(ctx.setpoints.take().is_some());
        let result = handle.wait().unwrap();
        assert!(result.ok);
        assert_eq!(result.points_sent, total);
        assert!(!dispatcher.is_busy());
    }

    /// 测试丢弃进度接收端不影响轨迹执行
    #[test]
    fn test_feedback_receiver_dropped() {
        let ctx = Arc::new(ControlContext::new());
        let reader = consumer(ctx.clone(), Duration::from_millis(1));
        let dispatcher = TrajectoryDispatcher::from_context(ctx.clone(), 0.001);

        let TrajectoryHandle {
            feedback, worker, ..
        } = dispatcher.submit(request(0.02)).unwrap();
        drop(feedback);
        let result = worker.join().unwrap();
        assert!(result.ok);
        assert_eq!(result.points_sent, result.total_points);
        assert!(!dispatcher.is_busy());

        ctx.shutdown();
        reader.join().unwrap();
    }

    /// 测试忙时拒绝且不影响正在执行的轨迹；取消后立即可再提交
    #[test]
    fn test_busy_then_cancel() {
        let ctx = Arc::new(ControlContext::new());
        let dispatcher = TrajectoryDispatcher::from_context(ctx.clone(), 0.01);

        // 没有消费者：第一个点写入后工作线程阻塞在槽上
        let first = dispatcher.submit(request(1.0)).unwrap();
        assert!(dispatcher.is_busy());
        assert!(matches!(dispatcher.submit(request(1.0)), Err(DispatchError::Busy)));
        assert!(!first.is_finished());

        let deadline = Instant::now() + Duration::from_secs(1);
        while ctx.setpoints.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        first.cancel();
        let started = Instant::now();
        let result = first.wait().unwrap();
        assert!(!result.ok);
        assert_eq!(result.points_sent, 1);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!dispatcher.is_busy());

        // 未读的点仍在槽中，没有被覆盖
        assert!(matches!(ctx.setpoints.take(), Some(Setpoint::Motion(_))));

        let second = dispatcher.submit(request(0.02)).unwrap();
        second.cancel();
        second.wait().unwrap();
    }

    /// 测试非法请求释放轨迹锁
    #[test]
    fn test_invalid_request_releases_lock() {
        let ctx = Arc::new(ControlContext::new());
        let dispatcher = TrajectoryDispatcher::from_context(ctx, 0.01);
        let bad = TrajectoryRequest::force_ramp(
            Wrench::zero(),
            Wrench::new(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros()),
            1.0,
            AxisMask::NONE,
        );
        assert!(matches!(
            dispatcher.submit(bad),
            Err(DispatchError::InvalidRequest(PlanError::EmptyMask))
        ));
        assert!(!dispatcher.is_busy());
    }

    /// 测试控制器停止后拒绝提交，执行中的轨迹中止
    #[test]
    fn test_controller_stopped() {
        let ctx = Arc::new(ControlContext::new());
        let dispatcher = TrajectoryDispatcher::from_context(ctx.clone(), 0.01);
        let handle = dispatcher.submit(request(1.0)).unwrap();

        ctx.shutdown();
        let result = handle.wait().unwrap();
        assert!(!result.ok);
        assert!(!dispatcher.is_busy());
        assert!(matches!(
            dispatcher.submit(request(1.0)),
            Err(DispatchError::NotRunning)
        ));
    }
}
