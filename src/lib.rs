// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 链路配置参数
pub mod control; // LED控制
pub mod display; // 显示端接口
pub mod error; // 错误类型
pub mod frame; // 帧解码
pub mod mock_device; // 本地模拟设备
pub mod poll; // 轮询循环
pub mod protocol; // 命令编解码
pub mod snapshot; // 快照保存
pub mod transport; // UDP传输

pub use crate::config::{Args, Endpoint, LinkConfig};
pub use crate::control::{ControlMessage, ControlSink};
pub use crate::display::{ChannelSink, DisplaySink, LatestTelemetry, TelemetryEvent};
pub use crate::error::{LinkError, ProtocolError};
pub use crate::frame::{decode_frame, decode_sensor_text, DimensionPolicy, DisplayBuffer, Frame};
pub use crate::poll::{CycleReport, PollState, Poller, Shutdown, SubOutcome};
pub use crate::protocol::{Command, LedTarget, Rgb8};
pub use crate::transport::{Transport, UdpTransport};

/// 本地时间字符串, 用于文件名
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

/// 安装日志输出 (默认info, 可用RUST_LOG覆盖)
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_string_shape() {
        let s = gen_time_string("-");
        assert_eq!(s.split('-').count(), 7);
        assert!(s.chars().all(|c| c.is_ascii_digit() || c == '-'));
    }
}
