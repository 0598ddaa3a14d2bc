//! 轨迹请求
//!
//! 一次请求是位置模式（笛卡尔航点）或力模式（力旋量航点 + 力控掩码）之一。
//! `times[i]` 是到达第 i 个航点的绝对时间（秒），必须与航点一一对应且严格递增。

use comply_core::{Accel, AxisMask, Pose, Twist, Wrench};
use thiserror::Error;

/// 请求或规划错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("At least 2 waypoints are required, got {0}")]
    TooFewWaypoints(usize),

    #[error("{waypoints} waypoints but {times} timestamps")]
    LengthMismatch { waypoints: usize, times: usize },

    #[error("Timestamps must be finite and strictly increasing (index {index})")]
    NonMonotonicTimes { index: usize },

    #[error("Waypoint {index} is not finite")]
    NonFiniteWaypoint { index: usize },

    #[error("Boundary conditions are not finite")]
    NonFiniteBoundary,

    #[error("Sample time must be positive, got {0}")]
    InvalidSampleTime(f64),

    #[error("Force trajectory mask selects no axis")]
    EmptyMask,
}

/// 位置轨迹起止边界条件（线速度、线加速度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundaryConditions {
    pub initial_velocity: Twist,
    pub final_velocity: Twist,
    pub initial_accel: Accel,
    pub final_accel: Accel,
}

impl BoundaryConditions {
    /// 起止静止
    pub fn at_rest() -> Self {
        Self::default()
    }

    fn is_finite(&self) -> bool {
        [
            self.initial_velocity.to_vector(),
            self.final_velocity.to_vector(),
            self.initial_accel.to_vector(),
            self.final_accel.to_vector(),
        ]
        .iter()
        .all(|v| v.iter().all(|x| x.is_finite()))
    }
}

/// 轨迹请求
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryRequest {
    /// 位置模式
    Pose {
        waypoints: Vec<Pose>,
        times: Vec<f64>,
        boundary: BoundaryConditions,
    },
    /// 力模式
    Force {
        waypoints: Vec<Wrench>,
        times: Vec<f64>,
        mask: AxisMask,
    },
}

impl TrajectoryRequest {
    /// 两点位置轨迹，起止静止
    pub fn move_to(start: Pose, goal: Pose, duration: f64) -> Self {
        Self::Pose {
            waypoints: vec![start, goal],
            times: vec![0.0, duration],
            boundary: BoundaryConditions::at_rest(),
        }
    }

    /// 两点力轨迹：在 `duration` 内从 `initial` 过渡到 `target`
    pub fn force_ramp(initial: Wrench, target: Wrench, duration: f64, mask: AxisMask) -> Self {
        Self::Force {
            waypoints: vec![initial, target],
            times: vec![0.0, duration],
            mask,
        }
    }

    pub fn is_force(&self) -> bool {
        matches!(self, Self::Force { .. })
    }

    /// 航点数
    pub fn len(&self) -> usize {
        match self {
            Self::Pose { waypoints, .. } => waypoints.len(),
            Self::Force { waypoints, .. } => waypoints.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 轨迹时长（最后一个时间戳减第一个）
    pub fn duration(&self) -> f64 {
        let times = self.times();
        match (times.first(), times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    fn times(&self) -> &[f64] {
        match self {
            Self::Pose { times, .. } | Self::Force { times, .. } => times,
        }
    }

    /// 校验请求
    pub fn validate(&self) -> Result<(), PlanError> {
        let times = self.times();
        let count = self.len();
        if count < 2 {
            return Err(PlanError::TooFewWaypoints(count));
        }
        if times.len() != count {
            return Err(PlanError::LengthMismatch {
                waypoints: count,
                times: times.len(),
            });
        }
        if let Some(index) = times.iter().position(|t| !t.is_finite()) {
            return Err(PlanError::NonMonotonicTimes { index });
        }
        if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PlanError::NonMonotonicTimes { index: index + 1 });
        }

        match self {
            Self::Pose {
                waypoints,
                boundary,
                ..
            } => {
                if let Some(index) = waypoints.iter().position(|p| !p.is_finite()) {
                    return Err(PlanError::NonFiniteWaypoint { index });
                }
                if !boundary.is_finite() {
                    return Err(PlanError::NonFiniteBoundary);
                }
            },
            Self::Force {
                waypoints, mask, ..
            } => {
                if let Some(index) = waypoints.iter().position(|w| !w.is_finite()) {
                    return Err(PlanError::NonFiniteWaypoint { index });
                }
                if !mask.any() {
                    return Err(PlanError::EmptyMask);
                }
            },
        }
        Ok(())
    }
}
