//! 控制器句柄
//!
//! [`Controller`] 持有控制线程与共享上下文。所有观察接口都是无锁快照读取，
//! 可以在任意线程调用；丢弃句柄时停止并回收控制线程。

use crate::error::DriverError;
use crate::hooks::ControlCallback;
use crate::metrics::MetricsSnapshot;
use crate::sensors::SensorInput;
use crate::state::{ControlContext, ControlSnapshot};
use comply_core::{ContactState, ControllerConfig, Pose, Wrench};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，超时后由进程退出回收
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 柔顺控制器
pub struct Controller {
    ctx: Arc<ControlContext>,
    sensors: SensorInput,
    control_thread: Option<JoinHandle<()>>,
    config: ControllerConfig,
}

impl Controller {
    pub(crate) fn new(
        ctx: Arc<ControlContext>,
        sensors: SensorInput,
        control_thread: JoinHandle<()>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            ctx,
            sensors,
            control_thread: Some(control_thread),
            config,
        }
    }

    /// 传感器输入句柄（交给传输层回调使用）
    pub fn sensors(&self) -> &SensorInput {
        &self.sensors
    }

    /// 共享上下文（轨迹分发器使用）
    pub fn context(&self) -> &Arc<ControlContext> {
        &self.ctx
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 控制周期
    pub fn period(&self) -> Duration {
        self.config.control_loop.period()
    }

    /// 最近一个 tick 的观察快照
    pub fn snapshot(&self) -> Arc<ControlSnapshot> {
        self.ctx.snapshot.load_full()
    }

    pub fn contact_state(&self) -> ContactState {
        self.ctx.snapshot.load().contact_state
    }

    /// 测得的末端位姿
    pub fn measured_pose(&self) -> Pose {
        self.ctx.kinematics.load().pose
    }

    /// 当前期望位姿（设定点或力跟踪律输出）
    pub fn desired_pose(&self) -> Pose {
        self.ctx.snapshot.load().desired.pose
    }

    /// 最新接触力（基坐标系）；尚未收到时为 `None`
    pub fn latest_wrench(&self) -> Option<Wrench> {
        let state = self.ctx.wrench.load();
        (state.sequence > 0).then_some(state.wrench)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 运行时注册回调
    pub fn add_hook(&self, callback: Arc<dyn ControlCallback>) {
        self.ctx.hooks.write().add_callback(callback);
    }

    /// 设置"任务已完成"外部信号（IMPACT → FREE 的守卫）
    pub fn set_task_done(&self, done: bool) {
        self.ctx.task_done.store(done, Ordering::Release);
    }

    /// 请求退出力控模式（下一个 tick 生效）
    pub fn exit_force_control(&self) {
        self.ctx.exit_force.store(true, Ordering::Release);
    }

    /// 控制线程是否仍在运行
    pub fn is_healthy(&self) -> bool {
        self.ctx.is_running()
            && self
                .control_thread
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// 是否已完成启动、进入周期运行
    pub fn is_ready(&self) -> bool {
        self.ctx.ready.load(Ordering::Acquire)
    }

    /// 等待控制循环进入周期运行
    ///
    /// # 错误
    /// - `NotRunning`: 控制线程已退出（例如启动时传感器超时）
    /// - `Timeout`: 超时
    pub fn wait_until_ready(&self, timeout: Duration) -> Result<(), DriverError> {
        const POLL_INTERVAL: Duration = Duration::from_millis(1);
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready() {
                return Ok(());
            }
            if !self.ctx.is_running() {
                return Err(DriverError::NotRunning);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.ctx.shutdown();

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.control_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Control thread panicked or failed to shut down within {:?}",
                join_timeout
            );
            return;
        }
        info!("Controller stopped");
    }
}
