//! 轨迹插值器
//!
//! - [`CartesianPlanner`]：多航点笛卡尔轨迹。位置逐段五次多项式（首末段满足
//!   边界速度/加速度，中间航点速度取相邻段平均斜率），姿态逐段 slerp，
//!   插值参数采用五次平滑 s(τ) = 10τ³ − 15τ⁴ + 6τ⁵
//! - [`WrenchPlanner`]：力旋量逐轴三次样条，起止变化率为 0
//!
//! 两者都是 Iterator，按控制周期逐点生成，最后一点恰好落在最后一个时间戳上。
//!
//! # 算法
//!
//! 每段在归一化时间 τ ∈ [0, 1] 上求系数，物理速度/加速度分别除以 h、h²
//! （h 为段时长）：
//! ```text
//! p(τ) = a0 + a1·τ + a2·τ² + a3·τ³ + a4·τ⁴ + a5·τ⁵
//! ```
//!
//! # 示例
//!
//! ```rust
//! use comply_client::{CartesianPlanner, TrajectoryRequest};
//! use comply_core::Pose;
//!
//! let request = TrajectoryRequest::move_to(
//!     Pose::from_translation(0.3, 0.0, 0.3),
//!     Pose::from_translation(0.4, 0.0, 0.3),
//!     1.0,
//! );
//! let planner = CartesianPlanner::from_request(&request, 0.01).unwrap();
//! assert_eq!(planner.total_samples(), 101);
//! for point in planner {
//!     assert!(point.pose.position.x >= 0.3 - 1e-9);
//! }
//! ```

use crate::request::{BoundaryConditions, PlanError, TrajectoryRequest};
use comply_core::{Accel, AxisMask, ForceSetpoint, MotionSetpoint, Pose, Setpoint, Twist, Wrench};
use nalgebra::{UnitQuaternion, Vector3};

/// 三次样条系数
///
/// 表示 `p(τ) = a0 + a1*τ + a2*τ² + a3*τ³`
#[derive(Debug, Clone, Copy)]
struct CubicCoeffs {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl CubicCoeffs {
    /// 边界条件 `p(0) = p0`, `v(0) = v0`, `p(1) = p1`, `v(1) = v1`（速度为归一化时间导数）
    fn new(p0: f64, v0: f64, p1: f64, v1: f64) -> Self {
        Self {
            a0: p0,
            a1: v0,
            a2: 3.0 * (p1 - p0) - 2.0 * v0 - v1,
            a3: -2.0 * (p1 - p0) + v0 + v1,
        }
    }

    fn position(&self, t: f64) -> f64 {
        self.a0 + self.a1 * t + self.a2 * t * t + self.a3 * t * t * t
    }

    fn velocity(&self, t: f64) -> f64 {
        self.a1 + 2.0 * self.a2 * t + 3.0 * self.a3 * t * t
    }
}

/// 五次多项式系数
#[derive(Debug, Clone, Copy)]
struct QuinticCoeffs {
    a: [f64; 6],
}

impl QuinticCoeffs {
    /// 边界条件为位置、速度、加速度（均为归一化时间导数）
    fn new(p0: f64, v0: f64, acc0: f64, p1: f64, v1: f64, acc1: f64) -> Self {
        let d = p1 - p0;
        Self {
            a: [
                p0,
                v0,
                0.5 * acc0,
                10.0 * d - 6.0 * v0 - 4.0 * v1 - 0.5 * (3.0 * acc0 - acc1),
                -15.0 * d + 8.0 * v0 + 7.0 * v1 + 0.5 * (3.0 * acc0 - 2.0 * acc1),
                6.0 * d - 3.0 * v0 - 3.0 * v1 - 0.5 * (acc0 - acc1),
            ],
        }
    }

    fn position(&self, t: f64) -> f64 {
        let a = &self.a;
        a[0] + t * (a[1] + t * (a[2] + t * (a[3] + t * (a[4] + t * a[5]))))
    }

    fn velocity(&self, t: f64) -> f64 {
        let a = &self.a;
        a[1] + t * (2.0 * a[2] + t * (3.0 * a[3] + t * (4.0 * a[4] + t * 5.0 * a[5])))
    }

    fn accel(&self, t: f64) -> f64 {
        let a = &self.a;
        2.0 * a[2] + t * (6.0 * a[3] + t * (12.0 * a[4] + t * 20.0 * a[5]))
    }
}

/// 五次平滑插值参数 s(τ) 及其对 τ 的一、二阶导数
fn smoothstep(t: f64) -> (f64, f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;
    (
        t3 * (10.0 - 15.0 * t + 6.0 * t2),
        30.0 * t2 * (1.0 - 2.0 * t + t2),
        60.0 * t * (1.0 - 3.0 * t + 2.0 * t2),
    )
}

/// 中间航点速度：相邻两段斜率同号时取平均，否则为 0
fn via_velocity(prev: f64, here: f64, next: f64, h_prev: f64, h_next: f64) -> f64 {
    let s_prev = (here - prev) / h_prev;
    let s_next = (next - here) / h_next;
    if s_prev * s_next > 0.0 {
        0.5 * (s_prev + s_next)
    } else {
        0.0
    }
}

/// 逐段时间轴与采样状态
#[derive(Debug, Clone)]
struct Timeline {
    times: Vec<f64>,
    sample_time: f64,
    current_index: usize,
    total_samples: usize,
}

impl Timeline {
    fn new(times: &[f64], sample_time: f64) -> Result<Self, PlanError> {
        if !(sample_time.is_finite() && sample_time > 0.0) {
            return Err(PlanError::InvalidSampleTime(sample_time));
        }
        let duration = times[times.len() - 1] - times[0];
        Ok(Self {
            times: times.to_vec(),
            sample_time,
            current_index: 0,
            total_samples: (duration / sample_time - 1e-9).ceil() as usize + 1,
        })
    }

    fn segment_duration(&self, segment: usize) -> f64 {
        self.times[segment + 1] - self.times[segment]
    }

    /// 下一个采样点所在段、段内归一化时间与段时长
    fn advance(&mut self) -> Option<(usize, f64, f64)> {
        if self.current_index >= self.total_samples {
            return None;
        }
        let start = self.times[0];
        let end = self.times[self.times.len() - 1];
        let t = if self.current_index + 1 == self.total_samples {
            end
        } else {
            (start + self.current_index as f64 * self.sample_time).min(end)
        };
        self.current_index += 1;

        let last = self.times.len() - 2;
        let segment = self.times[1..=last]
            .iter()
            .position(|&boundary| t < boundary)
            .unwrap_or(last);
        let h = self.segment_duration(segment);
        let tau = ((t - self.times[segment]) / h).clamp(0.0, 1.0);
        Some((segment, tau, h))
    }

    fn progress(&self) -> f64 {
        if self.total_samples == 0 {
            1.0
        } else {
            self.current_index as f64 / self.total_samples as f64
        }
    }
}

/// 单段姿态插值：q0 · exp(r · s)
#[derive(Debug, Clone, Copy)]
struct SlerpSegment {
    start: UnitQuaternion<f64>,
    /// 起始姿态下的相对旋转向量
    rotation: Vector3<f64>,
}

/// 笛卡尔轨迹插值器
#[derive(Debug, Clone)]
pub struct CartesianPlanner {
    /// 每段每个平移轴的系数
    segments: Vec<[QuinticCoeffs; 3]>,
    orientation: Vec<SlerpSegment>,
    timeline: Timeline,
}

impl CartesianPlanner {
    /// 创建插值器
    ///
    /// # 参数
    /// - `waypoints`, `times`: 航点与到达时间
    /// - `boundary`: 起止线速度/线加速度
    /// - `sample_time`: 采样周期（秒），与控制周期一致
    pub fn new(
        waypoints: &[Pose],
        times: &[f64],
        boundary: &BoundaryConditions,
        sample_time: f64,
    ) -> Result<Self, PlanError> {
        TrajectoryRequest::Pose {
            waypoints: waypoints.to_vec(),
            times: times.to_vec(),
            boundary: *boundary,
        }
        .validate()?;
        let timeline = Timeline::new(times, sample_time)?;
        let n = waypoints.len();

        // 各航点的物理速度与加速度（每轴）
        let mut velocity = vec![Vector3::zeros(); n];
        let mut accel = vec![Vector3::zeros(); n];
        velocity[0] = boundary.initial_velocity.linear;
        velocity[n - 1] = boundary.final_velocity.linear;
        accel[0] = boundary.initial_accel.linear;
        accel[n - 1] = boundary.final_accel.linear;
        for i in 1..n - 1 {
            let h_prev = times[i] - times[i - 1];
            let h_next = times[i + 1] - times[i];
            for axis in 0..3 {
                velocity[i][axis] = via_velocity(
                    waypoints[i - 1].position[axis],
                    waypoints[i].position[axis],
                    waypoints[i + 1].position[axis],
                    h_prev,
                    h_next,
                );
            }
        }

        let segments = (0..n - 1)
            .map(|i| {
                let h = times[i + 1] - times[i];
                let (p0, p1) = (&waypoints[i].position, &waypoints[i + 1].position);
                std::array::from_fn(|axis| {
                    QuinticCoeffs::new(
                        p0[axis],
                        velocity[i][axis] * h,
                        accel[i][axis] * h * h,
                        p1[axis],
                        velocity[i + 1][axis] * h,
                        accel[i + 1][axis] * h * h,
                    )
                })
            })
            .collect();

        let orientation = waypoints
            .windows(2)
            .map(|pair| SlerpSegment {
                start: pair[0].orientation,
                rotation: (pair[0].orientation.inverse() * pair[1].orientation).scaled_axis(),
            })
            .collect();

        Ok(Self {
            segments,
            orientation,
            timeline,
        })
    }

    /// 从位置模式请求创建；力模式请求返回 `None`
    pub fn from_request(request: &TrajectoryRequest, sample_time: f64) -> Option<Self> {
        match request {
            TrajectoryRequest::Pose {
                waypoints,
                times,
                boundary,
            } => Self::new(waypoints, times, boundary, sample_time).ok(),
            TrajectoryRequest::Force { .. } => None,
        }
    }

    pub fn total_samples(&self) -> usize {
        self.timeline.total_samples
    }

    /// 当前进度（0.0 到 1.0）
    pub fn progress(&self) -> f64 {
        self.timeline.progress()
    }

    fn evaluate(&self, segment: usize, tau: f64, h: f64) -> MotionSetpoint {
        let coeffs = &self.segments[segment];
        let position = Vector3::from_fn(|axis, _| coeffs[axis].position(tau));
        let linear_vel = Vector3::from_fn(|axis, _| coeffs[axis].velocity(tau) / h);
        let linear_acc = Vector3::from_fn(|axis, _| coeffs[axis].accel(tau) / (h * h));

        let slerp = &self.orientation[segment];
        let (s, s_dot, s_ddot) = smoothstep(tau);
        let orientation = slerp.start * UnitQuaternion::from_scaled_axis(slerp.rotation * s);
        let axis_world = slerp.start * slerp.rotation;

        MotionSetpoint {
            pose: Pose::new(position, orientation),
            twist: Twist::new(linear_vel, axis_world * (s_dot / h)),
            accel: Accel::new(linear_acc, axis_world * (s_ddot / (h * h))),
        }
    }
}

impl Iterator for CartesianPlanner {
    type Item = MotionSetpoint;

    fn next(&mut self) -> Option<Self::Item> {
        let (segment, tau, h) = self.timeline.advance()?;
        Some(self.evaluate(segment, tau, h))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.timeline.total_samples - self.timeline.current_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CartesianPlanner {}

/// 力旋量轨迹插值器
#[derive(Debug, Clone)]
pub struct WrenchPlanner {
    /// 每段每个分量的系数
    segments: Vec<[CubicCoeffs; 6]>,
    mask: AxisMask,
    timeline: Timeline,
}

impl WrenchPlanner {
    pub fn new(
        waypoints: &[Wrench],
        times: &[f64],
        mask: AxisMask,
        sample_time: f64,
    ) -> Result<Self, PlanError> {
        TrajectoryRequest::Force {
            waypoints: waypoints.to_vec(),
            times: times.to_vec(),
            mask,
        }
        .validate()?;
        let timeline = Timeline::new(times, sample_time)?;
        let n = waypoints.len();
        let values: Vec<_> = waypoints.iter().map(Wrench::to_vector).collect();

        let mut rates = vec![[0.0; 6]; n];
        for i in 1..n - 1 {
            let h_prev = times[i] - times[i - 1];
            let h_next = times[i + 1] - times[i];
            for (c, rate) in rates[i].iter_mut().enumerate() {
                *rate = via_velocity(values[i - 1][c], values[i][c], values[i + 1][c], h_prev, h_next);
            }
        }

        let segments = (0..n - 1)
            .map(|i| {
                let h = times[i + 1] - times[i];
                std::array::from_fn(|c| {
                    CubicCoeffs::new(
                        values[i][c],
                        rates[i][c] * h,
                        values[i + 1][c],
                        rates[i + 1][c] * h,
                    )
                })
            })
            .collect();

        Ok(Self {
            segments,
            mask,
            timeline,
        })
    }

    pub fn total_samples(&self) -> usize {
        self.timeline.total_samples
    }

    pub fn progress(&self) -> f64 {
        self.timeline.progress()
    }
}

impl Iterator for WrenchPlanner {
    type Item = ForceSetpoint;

    fn next(&mut self) -> Option<Self::Item> {
        let (segment, tau, h) = self.timeline.advance()?;
        let coeffs = &self.segments[segment];
        let wrench = comply_core::Vector6::from_fn(|c, _| coeffs[c].position(tau));
        let rate = comply_core::Vector6::from_fn(|c, _| coeffs[c].velocity(tau) / h);
        Some(ForceSetpoint {
            wrench: Wrench::from_vector(&wrench),
            wrench_rate: Wrench::from_vector(&rate),
            mask: self.mask,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.timeline.total_samples - self.timeline.current_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WrenchPlanner {}

/// 可发送到控制线程的设定点序列
pub type SetpointStream = Box<dyn Iterator<Item = Setpoint> + Send>;

/// 按请求类型选择插值器，返回设定点序列与总点数
pub fn plan(request: &TrajectoryRequest, sample_time: f64) -> Result<(SetpointStream, usize), PlanError> {
    match request {
        TrajectoryRequest::Pose {
            waypoints,
            times,
            boundary,
        } => {
            let planner = CartesianPlanner::new(waypoints, times, boundary, sample_time)?;
            let total = planner.total_samples();
            Ok((Box::new(planner.map(Setpoint::Motion)), total))
        },
        TrajectoryRequest::Force {
            waypoints,
            times,
            mask,
        } => {
            let planner = WrenchPlanner::new(waypoints, times, *mask, sample_time)?;
            let total = planner.total_samples();
            Ok((Box::new(planner.map(Setpoint::Force)), total))
        },
    }
}
