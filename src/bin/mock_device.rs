/// 模拟设备 (Mock device)
///
/// 在本机模拟相机/IMU/LED设备, 配合 viewer 使用:
///   cargo run --bin mock-device -- --port 3333
///   cargo run --bin viewer -- --host 127.0.0.1 --port 3333
use anyhow::{Context, Result};
use camlink_rs::mock_device::{test_pattern_jpeg, MockDevice, MockDeviceConfig};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug)]
#[command(author, version, about = "模拟相机/IMU/LED设备", long_about = None)]
struct Args {
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// 监听端口
    #[arg(short, long, default_value_t = 3333)]
    port: u16,

    /// 测试图宽度
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// 测试图高度
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// 固定的IMU文本 (默认生成变化的姿态)
    #[arg(long)]
    imu: Option<String>,
}

fn main() -> Result<()> {
    camlink_rs::init_tracing();
    let args = Args::parse();

    let image = test_pattern_jpeg(args.width, args.height).context("生成测试图失败")?;
    tracing::info!(
        "🖼️ 测试图 {}x{}, JPEG {} 字节",
        args.width,
        args.height,
        image.len()
    );

    let device = MockDevice::start(
        SocketAddr::new(args.bind, args.port),
        MockDeviceConfig {
            image,
            imu_text: args.imu,
        },
    )
    .with_context(|| format!("无法绑定 {}:{}", args.bind, args.port))?;

    tracing::info!("✅ 模拟设备就绪, Ctrl+C 退出");
    device.wait();
    Ok(())
}
