//! Builder 模式实现
//!
//! 提供链式构造 [`Controller`] 实例的便捷方式。

use crate::controller::Controller;
use crate::error::DriverError;
use crate::hooks::ControlCallback;
use crate::kinematics::Kinematics;
use crate::pipeline::control_loop;
use crate::sensors::SensorInput;
use crate::state::ControlContext;
use comply_core::ControllerConfig;
use std::sync::Arc;
use tracing::info;

/// Controller Builder（链式构造）
///
/// # Example
///
/// ```
/// use comply_driver::{ControllerBuilder, kinematics::CartesianKinematics};
/// use comply_core::ControllerConfig;
/// use std::sync::Arc;
///
/// let mut config = ControllerConfig::default();
/// config.control_loop.require_wrench = false;
///
/// let controller = ControllerBuilder::new(Arc::new(CartesianKinematics::new()))
///     .config(config)
///     .thread_name("arm-control")
///     .build()
///     .unwrap();
/// assert!(controller.is_healthy());
/// ```
pub struct ControllerBuilder {
    kinematics: Arc<dyn Kinematics>,
    config: ControllerConfig,
    hooks: Vec<Arc<dyn ControlCallback>>,
    thread_name: String,
}

impl ControllerBuilder {
    /// 以运动学协作者创建 Builder，其余使用默认配置
    pub fn new(kinematics: Arc<dyn Kinematics>) -> Self {
        Self {
            kinematics,
            config: ControllerConfig::default(),
            hooks: Vec::new(),
            thread_name: "comply-control".to_string(),
        }
    }

    /// 设置控制器配置（可选）
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// 在控制线程启动前注册回调
    pub fn hook(mut self, callback: Arc<dyn ControlCallback>) -> Self {
        self.hooks.push(callback);
        self
    }

    /// 设置控制线程名（可选）
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// 校验配置并启动控制线程
    ///
    /// # 错误
    /// - `Config`: 配置校验失败
    /// - `InvalidInput`: 运动学自由度为 0
    /// - `Spawn`: 线程创建失败
    pub fn build(self) -> Result<Controller, DriverError> {
        self.config.validate()?;
        if self.kinematics.dof() == 0 {
            return Err(DriverError::InvalidInput(
                "kinematics reports zero degrees of freedom".to_string(),
            ));
        }

        let ctx = Arc::new(ControlContext::new());
        {
            let mut hooks = ctx.hooks.write();
            for callback in self.hooks {
                hooks.add_callback(callback);
            }
        }
        let sensors = SensorInput::new(ctx.clone(), self.kinematics.clone(), &self.config);

        let loop_ctx = ctx.clone();
        let loop_kinematics = self.kinematics.clone();
        let loop_config = self.config.clone();
        let handle = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || control_loop(loop_ctx, loop_kinematics, loop_config))
            .map_err(DriverError::Spawn)?;

        info!(
            "Controller thread '{}' spawned ({} DOF, period {:?})",
            self.thread_name,
            self.kinematics.dof(),
            self.config.control_loop.period()
        );
        Ok(Controller::new(ctx, sensors, handle, self.config))
    }
}
