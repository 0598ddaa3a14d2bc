//! 轨迹预览命令
//!
//! 按控制周期插值一段直线位姿轨迹，逐点以 JSON 行打印。

use anyhow::Result;
use clap::Args;
use comply_sdk::client::plan;
use comply_sdk::{Pose, Setpoint, TrajectoryRequest};
use serde_json::json;

/// 解析 "x,y,z"
fn parse_point(s: &str) -> Result<[f64; 3], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; 3]>::try_from(values).map_err(|v| format!("expected 3 values, got {}", v.len()))
}

/// 轨迹预览参数
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// 起点位置 x,y,z（米）
    #[arg(long, value_parser = parse_point, default_value = "0.3,0.0,0.3")]
    pub from: [f64; 3],

    /// 终点位置 x,y,z（米）
    #[arg(long, value_parser = parse_point)]
    pub to: [f64; 3],

    /// 时长（秒）
    #[arg(short, long, default_value_t = 2.0)]
    pub duration: f64,

    /// 采样周期（秒）
    #[arg(long, default_value_t = 0.01)]
    pub sample_time: f64,

    /// 每隔多少个点输出一行
    #[arg(long, default_value_t = 1)]
    pub every: usize,
}

impl PlanCommand {
    pub fn execute(&self) -> Result<()> {
        let [x0, y0, z0] = self.from;
        let [x1, y1, z1] = self.to;
        let request = TrajectoryRequest::move_to(
            Pose::from_translation(x0, y0, z0),
            Pose::from_translation(x1, y1, z1),
            self.duration,
        );
        let (points, total) = plan(&request, self.sample_time)?;
        let every = self.every.max(1);

        for (index, point) in points.enumerate() {
            if index % every != 0 && index + 1 != total {
                continue;
            }
            let Setpoint::Motion(motion) = point else {
                continue;
            };
            let p = motion.pose.position;
            let v = motion.twist.linear;
            let a = motion.accel.linear;
            println!(
                "{}",
                json!({
                    "index": index,
                    "t": index as f64 * self.sample_time,
                    "position": [p.x, p.y, p.z],
                    "velocity": [v.x, v.y, v.z],
                    "accel": [a.x, a.y, a.z],
                })
            );
        }
        Ok(())
    }
}
