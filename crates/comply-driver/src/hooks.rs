//! 钩子系统（Hook System）
//!
//! 控制线程每 tick 通过钩子发布关节命令、诊断量以及接触状态迁移事件。
//!
//! # 设计原则
//!
//! - **非阻塞**: 回调运行在控制线程上，必须在微秒级完成，推荐转发到 Channel
//! - **职责分离**: HookManager 管理运行时回调，`ControllerConfig` 保持为纯数据
//!
//! # 使用示例
//!
//! ```rust
//! use comply_driver::hooks::{ChannelHook, ControlCallback, HookManager};
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (hook, receivers) = ChannelHook::new(64);
//! hooks.add_callback(Arc::new(hook) as Arc<dyn ControlCallback>);
//! assert_eq!(hooks.len(), 1);
//! assert!(receivers.commands.is_empty());
//! ```

use crate::command::{Diagnostics, JointCommand};
use comply_core::ContactTransition;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 控制输出回调
///
/// # 性能要求
///
/// - **非阻塞**: 禁止 I/O 与长时间持锁
/// - **Channel 模式**: 推荐使用 `crossbeam_channel::Sender::try_send`
pub trait ControlCallback: Send + Sync {
    /// 每 tick 发布关节命令
    fn on_command(&self, command: &JointCommand);

    /// 每 tick 发布诊断量（默认忽略）
    fn on_diagnostics(&self, diagnostics: &Diagnostics) {
        let _ = diagnostics;
    }

    /// 接触状态迁移（默认忽略）
    fn on_transition(&self, transition: &ContactTransition) {
        let _ = transition;
    }
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的，需要外部同步（`ControlContext` 中以 `RwLock` 包装）。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn ControlCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn ControlCallback>) {
        self.callbacks.push(callback);
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn trigger_command(&self, command: &JointCommand) {
        for callback in &self.callbacks {
            callback.on_command(command);
        }
    }

    pub fn trigger_diagnostics(&self, diagnostics: &Diagnostics) {
        for callback in &self.callbacks {
            callback.on_diagnostics(diagnostics);
        }
    }

    pub fn trigger_transition(&self, transition: &ContactTransition) {
        for callback in &self.callbacks {
            callback.on_transition(transition);
        }
    }
}

/// 把控制输出转发到有界 Channel 的回调
///
/// 队列满时丢弃并计数，不会阻塞控制线程。
pub struct ChannelHook {
    commands: Sender<JointCommand>,
    diagnostics: Sender<Diagnostics>,
    transitions: Sender<ContactTransition>,
    dropped: AtomicU64,
}

/// [`ChannelHook`] 的接收端
pub struct HookReceivers {
    pub commands: Receiver<JointCommand>,
    pub diagnostics: Receiver<Diagnostics>,
    pub transitions: Receiver<ContactTransition>,
}

impl ChannelHook {
    /// 创建回调与接收端（每个 Channel 容量为 `capacity`）
    pub fn new(capacity: usize) -> (Self, HookReceivers) {
        let (cmd_tx, cmd_rx) = bounded(capacity);
        let (diag_tx, diag_rx) = bounded(capacity);
        let (trans_tx, trans_rx) = bounded(capacity);
        (
            Self {
                commands: cmd_tx,
                diagnostics: diag_tx,
                transitions: trans_tx,
                dropped: AtomicU64::new(0),
            },
            HookReceivers {
                commands: cmd_rx,
                diagnostics: diag_rx,
                transitions: trans_rx,
            },
        )
    }

    /// 因队列满被丢弃的消息数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record<T>(&self, result: Result<(), crossbeam_channel::TrySendError<T>>) {
        if result.is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl ControlCallback for ChannelHook {
    fn on_command(&self, command: &JointCommand) {
        self.record(self.commands.try_send(command.clone()));
    }

    fn on_diagnostics(&self, diagnostics: &Diagnostics) {
        self.record(self.diagnostics.try_send(*diagnostics));
    }

    fn on_transition(&self, transition: &ContactTransition) {
        self.record(self.transitions.try_send(*transition));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::JointVector;
    use comply_core::ContactState;

    fn command(tick: u64) -> JointCommand {
        JointCommand {
            tick,
            positions: JointVector::zeros(6),
            held: false,
        }
    }

    /// 测试回调按注册顺序触发
    #[test]
    fn test_trigger_all_callbacks() {
        let mut hooks = HookManager::new();
        let (a, rx_a) = ChannelHook::new(4);
        let (b, rx_b) = ChannelHook::new(4);
        hooks.add_callback(Arc::new(a));
        hooks.add_callback(Arc::new(b));

        hooks.trigger_command(&command(1));
        hooks.trigger_transition(&ContactTransition {
            from: ContactState::Free,
            to: ContactState::Hooked,
        });

        assert_eq!(rx_a.commands.try_recv().unwrap().tick, 1);
        assert_eq!(rx_b.commands.try_recv().unwrap().tick, 1);
        assert_eq!(rx_a.transitions.try_recv().unwrap().to, ContactState::Hooked);

        hooks.clear();
        assert!(hooks.is_empty());
    }

    /// 测试队列满时丢弃而不阻塞
    #[test]
    fn test_channel_hook_drops_when_full() {
        let (hook, rx) = ChannelHook::new(2);
        for tick in 0..5 {
            hook.on_command(&command(tick));
        }
        assert_eq!(hook.dropped(), 3);
        assert_eq!(rx.commands.len(), 2);
    }
}
