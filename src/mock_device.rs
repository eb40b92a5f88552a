//! 模拟设备 - 本地UDP应答器
//!
//! 与真实设备说同一套协议: `get_camera` 回JPEG, `get_imu` 回姿态文本,
//! `set_led` 只记录不回复。可以切换为"沉默"来模拟丢包。

use crate::protocol::{Command, LedTarget, Rgb8};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 模拟设备的应答内容
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    /// `get_camera` 的回复 (已编码的图像)
    pub image: Vec<u8>,
    /// 为None时按请求次数生成变化的姿态文本
    pub imu_text: Option<String>,
}

impl MockDeviceConfig {
    pub fn with_image(image: Vec<u8>) -> Self {
        Self {
            image,
            imu_text: None,
        }
    }
}

/// 彩条测试图, 按设备习惯上下颠倒后编码为JPEG
pub fn test_pattern_jpeg(width: u32, height: u32) -> image::ImageResult<Vec<u8>> {
    const BARS: [[u8; 3]; 6] = [
        [255, 255, 255],
        [255, 255, 0],
        [0, 255, 255],
        [0, 255, 0],
        [255, 0, 255],
        [255, 0, 0],
    ];
    let img = RgbImage::from_fn(width, height, |x, _| {
        let bar = (x as usize * BARS.len()) / width.max(1) as usize;
        Rgb(BARS[bar.min(BARS.len() - 1)])
    });
    encode_jpeg(&DynamicImage::ImageRgb8(img).flipv())
}

/// 纯色JPEG
pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> image::ImageResult<Vec<u8>> {
    encode_jpeg(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb(color),
    )))
}

fn encode_jpeg(img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
    Ok(bytes)
}

struct Shared {
    silent: AtomicBool,
    stop: AtomicBool,
    requests: AtomicU64,
    leds: Mutex<Vec<(LedTarget, Rgb8)>>,
}

/// 运行中的模拟设备, drop时停止
pub struct MockDevice {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl MockDevice {
    /// 绑定地址并在后台线程应答
    pub fn start(bind: impl Into<SocketAddr>, config: MockDeviceConfig) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind.into())?;
        socket.set_read_timeout(Some(Duration::from_millis(50)))?;
        let addr = socket.local_addr()?;

        let shared = Arc::new(Shared {
            silent: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            requests: AtomicU64::new(0),
            leds: Mutex::new(Vec::new()),
        });

        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("mock-device".to_string())
            .spawn(move || serve(socket, config, worker))?;

        info!("🤖 模拟设备监听 {}", addr);
        Ok(Self {
            addr,
            shared,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// 沉默模式: 收到请求但不回复
    pub fn set_silent(&self, silent: bool) {
        self.shared.silent.store(silent, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.shared.requests.load(Ordering::Relaxed)
    }

    /// 收到的全部LED命令
    pub fn led_commands(&self) -> Vec<(LedTarget, Rgb8)> {
        self.shared
            .leds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 阻塞运行直到进程结束 (mock-device 可执行文件使用)
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(socket: UdpSocket, config: MockDeviceConfig, shared: Arc<Shared>) {
    let mut buf = vec![0u8; 4096];
    while !shared.stop.load(Ordering::Relaxed) {
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue
            }
            Err(e) => {
                warn!("⚠️ 模拟设备接收失败: {}", e);
                continue;
            }
        };
        let seq = shared.requests.fetch_add(1, Ordering::Relaxed);

        let reply = match Command::parse(&buf[..n]) {
            Ok(Command::FetchImage) => Some(config.image.clone()),
            Ok(Command::FetchSensor) => Some(
                config
                    .imu_text
                    .clone()
                    .unwrap_or_else(|| imu_reading(seq))
                    .into_bytes(),
            ),
            Ok(Command::SetActuator { target, color }) => {
                debug!("💡 模拟设备 {} ← {:?}", target, color);
                shared
                    .leds
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((target, color));
                None
            }
            Err(e) => {
                warn!("⚠️ 模拟设备收到无法解析的请求: {}", e);
                None
            }
        };

        if shared.silent.load(Ordering::Relaxed) {
            continue;
        }
        if let Some(reply) = reply {
            if let Err(e) = socket.send_to(&reply, from) {
                warn!("⚠️ 模拟设备回复失败: {}", e);
            }
        }
    }
}

fn imu_reading(seq: u64) -> String {
    let t = seq as f64 * 0.05;
    format!(
        "roll={:.2} pitch={:.2} yaw={:.2}",
        10.0 * t.sin(),
        5.0 * (0.5 * t).cos(),
        (seq as f64 * 1.5) % 360.0
    )
}
