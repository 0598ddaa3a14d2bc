//! 设定点槽（一深度邮箱）
//!
//! 轨迹分发器写入、控制线程读取。与 `DataSignal` 方向相反的同一种握手：
//! 槽非空时写入方等待，直到控制线程取走上一个点，因此未读的点不会被覆盖。

use comply_core::Setpoint;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 一深度设定点槽
#[derive(Debug, Default)]
pub struct SetpointSlot {
    pending: Mutex<Option<Setpoint>>,
    drained: Condvar,
}

impl SetpointSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 槽为空时写入，否则原样退回
    pub fn try_put(&self, setpoint: Setpoint) -> Result<(), Setpoint> {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(setpoint);
        }
        *pending = Some(setpoint);
        Ok(())
    }

    /// 等待槽变空后写入，最多等待 `timeout`
    ///
    /// 超时返回 `Err(setpoint)`，调用方可检查取消标志后重试。
    pub fn put_timeout(&self, setpoint: Setpoint, timeout: Duration) -> Result<(), Setpoint> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while pending.is_some() {
            if self.drained.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        if pending.is_some() {
            return Err(setpoint);
        }
        *pending = Some(setpoint);
        Ok(())
    }

    /// 取出待消费的设定点（控制线程每 tick 调用一次）
    pub fn take(&self) -> Option<Setpoint> {
        let taken = self.pending.lock().take();
        if taken.is_some() {
            self.drained.notify_one();
        }
        taken
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_none()
    }

    /// 等待槽中的点被取走，最多等待 `timeout`；返回槽是否已空
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while pending.is_some() {
            if self.drained.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        pending.is_none()
    }

    /// 唤醒所有等待中的写入方（停机时使用）
    pub fn wake_all(&self) {
        self.drained.notify_all();
    }
}
