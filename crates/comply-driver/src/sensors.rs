//! 传感器数据接入
//!
//! [`SensorInput`] 是交给传感器传输层的可克隆句柄。每个回调只做本数据流的
//! 预处理，然后把结果发布到共享上下文并置位"新数据"信号，不会等待控制线程：
//!
//! - 关节状态：正运动学 + 末端加速度数值微分
//! - 多点接触力：求和后旋转到基坐标系
//! - 六维力传感器：前 K 个样本估计偏置，之后去偏置、逐通道低通、静态力旋量变换
//! - 外部位置反馈：原样发布，由控制线程滤波与限幅
//!
//! 每个数据流只能有一个生产者线程；处理状态以互斥量保护，正常情况下无竞争。

use crate::error::DriverError;
use crate::kinematics::{JointVector, Kinematics};
use crate::state::{ControlContext, KinematicState, PositionFeedback, WrenchState};
use comply_core::filter::{ChannelFilter, Differentiator};
use comply_core::math::wrench_transform;
use comply_core::{Accel, ControllerConfig, Vector6, Wrench};
use nalgebra::Vector3;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// 六维力传感器样本处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceTorqueStatus {
    /// 仍在估计偏置
    Calibrating { collected: u32, required: u32 },
    /// 已发布到共享状态
    Published,
    /// 非有限样本，已发布但未进入滤波器
    Rejected,
}

struct JointIngest {
    differentiator: Differentiator,
    sequence: u64,
}

struct ForceTorqueIngest {
    bias_sum: Vector6,
    collected: u32,
    required: u32,
    bias: Option<Vector6>,
    filter: ChannelFilter<6>,
}

impl ForceTorqueIngest {
    fn new(config: &ControllerConfig) -> Self {
        let force = &config.force;
        Self {
            bias_sum: Vector6::zeros(),
            collected: 0,
            required: force.bias_samples,
            bias: if force.bias_samples == 0 {
                Some(Vector6::zeros())
            } else {
                None
            },
            filter: ChannelFilter::new(force.sensor_sample_time, force.filter_cutoff_hz),
        }
    }
}

/// 传感器输入句柄（可克隆，线程安全）
#[derive(Clone)]
pub struct SensorInput {
    ctx: Arc<ControlContext>,
    kinematics: Arc<dyn Kinematics>,
    joints: Arc<Mutex<JointIngest>>,
    force_torque: Arc<Mutex<ForceTorqueIngest>>,
    wrench_sequence: Arc<AtomicU64>,
    feedback_sequence: Arc<AtomicU64>,
}

impl SensorInput {
    pub fn new(
        ctx: Arc<ControlContext>,
        kinematics: Arc<dyn Kinematics>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            ctx,
            kinematics,
            joints: Arc::new(Mutex::new(JointIngest {
                differentiator: Differentiator::new(
                    config.control_loop.joint_sample_time,
                    Differentiator::DEFAULT_GAIN,
                ),
                sequence: 0,
            })),
            force_torque: Arc::new(Mutex::new(ForceTorqueIngest::new(config))),
            wrench_sequence: Arc::new(AtomicU64::new(0)),
            feedback_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 关节状态到达
    ///
    /// # 错误
    /// - `InvalidInput`: 位置与速度长度不一致
    /// - `Kinematics`: 正运动学失败（样本被丢弃，计入 `fk_failures`）
    pub fn on_joint_state(&self, positions: &[f64], velocities: &[f64]) -> Result<(), DriverError> {
        if positions.len() != velocities.len() {
            return Err(DriverError::InvalidInput(format!(
                "{} joint positions but {} velocities",
                positions.len(),
                velocities.len()
            )));
        }
        let q = JointVector::from_row_slice(positions);
        let qd = JointVector::from_row_slice(velocities);
        let fk = self.kinematics.forward(&q, &qd).inspect_err(|e| {
            self.ctx.metrics.fk_failures.fetch_add(1, Ordering::Relaxed);
            warn!("Forward kinematics failed, joint sample dropped: {}", e);
        })?;

        let mut ingest = self.joints.lock();
        let accel = ingest.differentiator.update(&fk.twist.to_vector());
        ingest.sequence += 1;
        if ingest.sequence == 1 {
            info!("First joint state received ({} joints)", positions.len());
        }

        self.ctx.kinematics.store(Arc::new(KinematicState {
            sequence: ingest.sequence,
            received_at: Some(Instant::now()),
            positions: q,
            velocities: qd,
            pose: fk.pose,
            twist: fk.twist,
            accel: Accel::from_vector(&accel),
            jacobian: fk.jacobian,
            jacobian_rate: fk.jacobian_rate,
        }));
        drop(ingest);

        self.ctx.new_data.notify();
        Ok(())
    }

    /// 多点接触力到达（末端坐标系），求和后旋转到基坐标系
    pub fn on_contact_wrenches(&self, wrenches: &[Wrench]) {
        let total = wrenches
            .iter()
            .copied()
            .fold(Wrench::zero(), |acc, w| acc + w);
        let rotation = self.ctx.kinematics.load().pose.rotation();
        self.publish_wrench(total.rotated(&rotation));
    }

    /// 六维力传感器样本到达（传感器坐标系）
    pub fn on_force_torque(&self, raw: Wrench) -> ForceTorqueStatus {
        let mut ingest = self.force_torque.lock();

        let estimated = ingest.bias;
        if !raw.is_finite() {
            drop(ingest);
            debug!("Non-finite force/torque sample");
            // 标定期间丢弃，不计入样本数
            if estimated.is_some() {
                self.publish_wrench(raw);
            }
            return ForceTorqueStatus::Rejected;
        }

        let Some(bias) = estimated else {
            ingest.bias_sum += raw.to_vector();
            ingest.collected += 1;
            if ingest.collected < ingest.required {
                return ForceTorqueStatus::Calibrating {
                    collected: ingest.collected,
                    required: ingest.required,
                };
            }
            let bias = ingest.bias_sum / f64::from(ingest.collected);
            info!(
                "Force/torque bias estimated over {} samples: {:?}",
                ingest.collected,
                bias.as_slice()
            );
            ingest.bias = Some(bias);
            return ForceTorqueStatus::Calibrating {
                collected: ingest.collected,
                required: ingest.required,
            };
        };

        let unbiased = raw.to_vector() - bias;
        let mut channels = [0.0; 6];
        channels.copy_from_slice(unbiased.as_slice());
        let filtered = Vector6::from(ingest.filter.update(&channels));
        drop(ingest);

        let pose = self.ctx.kinematics.load().pose;
        let transformed = wrench_transform(&pose.rotation(), &pose.position) * filtered;
        self.publish_wrench(Wrench::from_vector(&transformed));
        ForceTorqueStatus::Published
    }

    /// 外部位置反馈到达（米）
    pub fn on_position_feedback(&self, offset: Vector3<f64>) {
        let sequence = self.feedback_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.ctx
            .position_feedback
            .store(Some(Arc::new(PositionFeedback { sequence, offset })));
    }

    /// 外部位置反馈中断
    pub fn clear_position_feedback(&self) {
        self.ctx.position_feedback.store(None);
    }

    /// 偏置估计是否已完成
    pub fn is_bias_ready(&self) -> bool {
        self.force_torque.lock().bias.is_some()
    }

    fn publish_wrench(&self, wrench: Wrench) {
        let sequence = self.wrench_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        if sequence == 1 {
            info!("First wrench sample received");
        }
        self.ctx.wrench.store(Arc::new(WrenchState {
            sequence,
            received_at: Some(Instant::now()),
            wrench,
        }));
        self.ctx.new_data.notify();
    }
}
