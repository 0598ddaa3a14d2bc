//! "新数据"信号
//!
//! 多个传感器回调置位，控制线程带超时等待并在返回时清零。
//! 置位方只在极短的临界区内写一个布尔量，不会被消费方阻塞。

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 一位的置位/等待信号
#[derive(Debug, Default)]
pub struct DataSignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl DataSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 置位并唤醒等待者
    pub fn notify(&self) {
        *self.ready.lock() = true;
        self.cond.notify_one();
    }

    /// 等待置位，最多等待 `timeout`
    ///
    /// 返回是否在超时前观察到置位；无论结果如何，返回时信号均已清零。
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.lock();
        while !*ready {
            if self.cond.wait_until(&mut ready, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *ready, false)
    }

    /// 不等待，直接读取并清零
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.ready.lock(), false)
    }
}
