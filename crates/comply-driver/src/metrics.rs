//! 控制循环性能指标
//!
//! 所有计数器均为原子量，控制线程与传感器回调以 `Relaxed` 顺序累加，
//! 观察者通过 [`ControlMetrics::snapshot`] 读取一份一致性要求不高的快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环指标（原子计数器）
#[derive(Debug, Default)]
pub struct ControlMetrics {
    /// 完成的控制周期数
    pub ticks: AtomicU64,
    /// 超出周期的 tick 数
    pub overruns: AtomicU64,
    /// 等待新数据超时、被跳过的 tick 数
    pub data_timeouts: AtomicU64,
    /// 逆解失败、沿用上一拍命令的次数
    pub ik_failures: AtomicU64,
    /// 非有限或超界的接触力读数次数
    pub malformed_wrenches: AtomicU64,
    /// 从设定点槽取出的点数
    pub setpoints_consumed: AtomicU64,
    /// 正运动学失败、丢弃的关节样本数
    pub fk_failures: AtomicU64,
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub overruns: u64,
    pub data_timeouts: u64,
    pub ik_failures: u64,
    pub malformed_wrenches: u64,
    pub setpoints_consumed: u64,
    pub fk_failures: u64,
}

impl ControlMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            data_timeouts: self.data_timeouts.load(Ordering::Relaxed),
            ik_failures: self.ik_failures.load(Ordering::Relaxed),
            malformed_wrenches: self.malformed_wrenches.load(Ordering::Relaxed),
            setpoints_consumed: self.setpoints_consumed.load(Ordering::Relaxed),
            fk_failures: self.fk_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.data_timeouts.store(0, Ordering::Relaxed);
        self.ik_failures.store(0, Ordering::Relaxed);
        self.malformed_wrenches.store(0, Ordering::Relaxed);
        self.setpoints_consumed.store(0, Ordering::Relaxed);
        self.fk_failures.store(0, Ordering::Relaxed);
    }
}

impl MetricsSnapshot {
    /// 超周期比例
    pub fn overrun_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.overruns as f64 / self.ticks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试快照与重置
    #[test]
    fn test_snapshot_and_reset() {
        let metrics = ControlMetrics::new();
        metrics.ticks.fetch_add(10, Ordering::Relaxed);
        metrics.overruns.fetch_add(2, Ordering::Relaxed);
        metrics.ik_failures.fetch_add(1, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.ticks, 10);
        assert_eq!(snap.ik_failures, 1);
        assert!((snap.overrun_rate() - 0.2).abs() < 1e-12);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
