//! 日志初始化
//!
//! 安装 `tracing_subscriber` 的 fmt 订阅者，并通过 `tracing_log` 把 `log`
//! 宏产生的记录转发到 tracing。`RUST_LOG` 存在时优先使用。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Global subscriber already set: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Log bridge already set: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
}

/// 以 `info` 级别初始化日志
pub fn init_logger() -> Result<(), LoggerError> {
    init_logger_with_filter("info")
}

/// 以指定的默认过滤指令初始化日志
///
/// # 参数
/// - `default_directive`: `RUST_LOG` 未设置时使用的过滤指令，如 `"comply_driver=debug"`
///
/// # 错误
/// - 指令无法解析
/// - 进程内已安装过全局订阅者或 log 桥接
pub fn init_logger_with_filter(default_directive: &str) -> Result<(), LoggerError> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试重复初始化返回错误而不是 panic
    #[test]
    fn test_second_init_fails() {
        let first = init_logger_with_filter("warn");
        assert!(first.is_ok());
        assert!(init_logger().is_err());
    }
}
