//! 轮询循环 (Poll loop)
//!
//! 独立工作线程, 每轮两次独立交换:
//! 1. `get_camera` → 解码 → 发布帧 + 瞬时帧率
//! 2. `get_imu`    → UTF-8 → 发布文本
//!
//! 任一子请求失败只跳过该子请求, 下一轮自然重试。超时是唯一的背压。

use crate::config::LinkConfig;
use crate::display::DisplaySink;
use crate::error::LinkError;
use crate::frame::{decode_frame, decode_sensor_text};
use crate::protocol::Command;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 前N次失败打印warn, 之后降为debug
const LOUD_FAILURES: u64 = 10;

/// 停止信号, 每轮开始时检查
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 当前所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    RequestingImage,
    Decoding,
    RequestingSensor,
    Publishing,
}

/// 帧率状态: 只记录上次成功解码的时间
#[derive(Debug, Clone, Copy)]
pub struct PollState {
    last_success: Instant,
}

impl PollState {
    pub fn new(now: Instant) -> Self {
        Self { last_success: now }
    }

    /// 记录一次成功解码, 返回瞬时帧率; 间隔为0时返回0
    pub fn record_success(&mut self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_success).as_secs_f64();
        self.last_success = now;
        if elapsed > 0.0 {
            1.0 / elapsed
        } else {
            0.0
        }
    }

    pub fn last_success(&self) -> Instant {
        self.last_success
    }
}

/// 子请求结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubOutcome {
    Published,
    Skipped,
    Disabled,
}

/// 一轮的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub image: SubOutcome,
    pub sensor: SubOutcome,
}

/// 轮询统计 (每秒打印一次)
#[derive(Debug, Clone, Default)]
pub struct PollStats {
    pub cycles: u64,
    pub frames: u64,
    pub sensor_reads: u64,
    pub timeouts: u64,
    pub failures: u64,
}

pub struct Poller<T, S> {
    transport: T,
    sink: S,
    state: PollState,
    phase: PollPhase,
    shutdown: Shutdown,
    cycle_yield: Duration,
    poll_sensor: bool,
    stats: PollStats,
    window_frames: u64,
    window_start: Instant,
}

impl<T: Transport, S: DisplaySink> Poller<T, S> {
    pub fn new(transport: T, sink: S, config: &LinkConfig) -> Self {
        let now = Instant::now();
        Self {
            transport,
            sink,
            state: PollState::new(now),
            phase: PollPhase::Idle,
            shutdown: Shutdown::new(),
            cycle_yield: config.cycle_yield(),
            poll_sensor: config.poll_sensor,
            stats: PollStats::default(),
            window_frames: 0,
            window_start: now,
        }
    }

    /// 使用外部提供的停止信号
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// 运行直到收到停止信号
    pub fn run(&mut self) {
        info!("🎬 轮询线程启动");
        while !self.shutdown.is_triggered() {
            self.cycle();
            self.pause();
        }
        info!("❌ 轮询线程退出 ({} 轮, {} 帧)", self.stats.cycles, self.stats.frames);
    }

    /// 最多运行n轮 (测试用), 返回实际完成的轮数
    pub fn run_cycles(&mut self, n: usize) -> usize {
        let mut done = 0;
        while done < n && !self.shutdown.is_triggered() {
            self.cycle();
            done += 1;
            if done < n {
                self.pause();
            }
        }
        done
    }

    fn pause(&self) {
        if !self.cycle_yield.is_zero() {
            std::thread::sleep(self.cycle_yield);
        }
    }

    /// 执行一轮: 图像 + IMU, 两者互不影响
    pub fn cycle(&mut self) -> CycleReport {
        self.stats.cycles += 1;

        let image = self.poll_image();
        let sensor = if self.poll_sensor {
            self.poll_sensor()
        } else {
            SubOutcome::Disabled
        };

        self.phase = PollPhase::Idle;
        self.log_rate();
        CycleReport { image, sensor }
    }

    fn poll_image(&mut self) -> SubOutcome {
        self.phase = PollPhase::RequestingImage;
        let reply = match self.transport.exchange(&Command::FetchImage.encode()) {
            Ok(reply) => reply,
            Err(e) => {
                self.note_failure("get_camera", &e);
                return SubOutcome::Skipped;
            }
        };

        self.phase = PollPhase::Decoding;
        match decode_frame(&reply) {
            Ok(frame) => {
                let fps = self.state.record_success(Instant::now());
                debug!("🖼️ 收到图像 {}x{} | {:.2} fps", frame.width(), frame.height(), fps);
                self.stats.frames += 1;
                self.window_frames += 1;
                self.sink.publish_fps(fps);
                self.sink.publish_frame(frame);
                SubOutcome::Published
            }
            Err(e) => {
                self.note_failure("decode", &e);
                SubOutcome::Skipped
            }
        }
    }

    fn poll_sensor(&mut self) -> SubOutcome {
        self.phase = PollPhase::RequestingSensor;
        let text = self
            .transport
            .exchange(&Command::FetchSensor.encode())
            .and_then(decode_sensor_text);

        match text {
            Ok(text) => {
                self.phase = PollPhase::Publishing;
                self.stats.sensor_reads += 1;
                self.sink.publish_sensor(text);
                SubOutcome::Published
            }
            Err(e) => {
                self.note_failure("get_imu", &e);
                SubOutcome::Skipped
            }
        }
    }

    fn note_failure(&mut self, what: &str, err: &LinkError) {
        let count = if err.is_timeout() {
            self.stats.timeouts += 1;
            self.stats.timeouts
        } else {
            self.stats.failures += 1;
            self.stats.failures
        };

        if count <= LOUD_FAILURES {
            warn!("⚠️ {} 跳过 (#{}): {}", what, count, err);
        } else {
            debug!("{} 跳过 (#{}): {}", what, count, err);
        }
    }

    fn log_rate(&mut self) {
        let elapsed = self.window_start.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            info!(
                "📺 轮询统计: {}帧 | 平均{:.1}fps | 超时{} | 失败{}",
                self.window_frames,
                self.window_frames as f64 / elapsed,
                self.stats.timeouts,
                self.stats.failures
            );
            self.window_frames = 0;
            self.window_start = Instant::now();
        }
    }
}

impl<T, S> Poller<T, S>
where
    T: Transport + 'static,
    S: DisplaySink + 'static,
{
    /// 在独立线程中运行, 返回停止信号和线程句柄
    pub fn spawn(mut self) -> std::io::Result<(Shutdown, JoinHandle<()>)> {
        let shutdown = self.shutdown_handle();
        let handle = std::thread::Builder::new()
            .name("poll".to_string())
            .spawn(move || self.run())?;
        Ok((shutdown, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{ChannelSink, LatestTelemetry};
    use crate::frame::tests::encode;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按脚本回复的传输层
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Vec<u8>, LinkError>>>,
        requests: Mutex<Vec<Vec<u8>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Vec<u8>, LinkError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, LinkError> {
            self.requests.lock().unwrap().push(request.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LinkError::Timeout))
        }

        fn send(&self, request: &[u8]) -> Result<(), LinkError> {
            self.requests.lock().unwrap().push(request.to_vec());
            Ok(())
        }
    }

    fn config() -> LinkConfig {
        LinkConfig {
            cycle_yield_ms: 0,
            ..LinkConfig::default()
        }
    }

    #[test]
    fn test_frame_rate() {
        let start = Instant::now();
        let mut state = PollState::new(start);
        let rate = state.record_success(start + Duration::from_millis(500));
        assert!((rate - 2.0).abs() < 1e-9);
        assert_eq!(state.record_success(start + Duration::from_millis(500)), 0.0);
        assert_eq!(state.last_success(), start + Duration::from_millis(500));
    }

    #[test]
    fn test_cycle_publishes_both() {
        let png = encode(RgbImage::from_pixel(2, 2, Rgb([0, 255, 0])), ImageFormat::Png);
        let transport = ScriptedTransport::new(vec![Ok(png), Ok(b"yaw=3\0".to_vec())]);
        let (sink, rx) = ChannelSink::bounded(8);
        let mut poller = Poller::new(transport, sink, &config());

        let report = poller.cycle();
        assert_eq!(report.image, SubOutcome::Published);
        assert_eq!(report.sensor, SubOutcome::Published);
        assert_eq!(poller.phase(), PollPhase::Idle);

        let mut latest = LatestTelemetry::default();
        assert!(latest.drain(&rx));
        assert_eq!(latest.frame.unwrap().pixel(1, 1), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(latest.sensor.as_deref(), Some("yaw=3"));

        let requests = poller.transport.requests.lock().unwrap();
        assert_eq!(requests[0], b"get_camera");
        assert_eq!(requests[1], b"get_imu");
    }

    #[test]
    fn test_failures_are_independent() {
        let transport = ScriptedTransport::new(vec![
            Ok(b"garbage".to_vec()),
            Ok(b"pitch=1".to_vec()),
            Err(LinkError::Timeout),
            Ok(vec![0xff]),
        ]);
        let (sink, rx) = ChannelSink::bounded(8);
        let mut poller = Poller::new(transport, sink, &config());

        let first = poller.cycle();
        assert_eq!(first.image, SubOutcome::Skipped);
        assert_eq!(first.sensor, SubOutcome::Published);

        let second = poller.cycle();
        assert_eq!(second.image, SubOutcome::Skipped);
        assert_eq!(second.sensor, SubOutcome::Skipped);

        // 失败不会清空已显示的内容
        let mut latest = LatestTelemetry::default();
        latest.drain(&rx);
        assert!(latest.frame.is_none());
        assert_eq!(latest.sensor.as_deref(), Some("pitch=1"));

        assert_eq!(poller.stats().timeouts, 1);
        assert_eq!(poller.stats().failures, 2);
    }

    #[test]
    fn test_socket_error_skips_like_timeout() {
        let refused = || LinkError::Io(std::io::ErrorKind::ConnectionRefused.into());
        let transport = ScriptedTransport::new(vec![
            Err(refused()),
            Ok(b"roll=2".to_vec()),
            Err(LinkError::Timeout),
            Err(refused()),
        ]);
        let (sink, rx) = ChannelSink::bounded(8);
        let mut poller = Poller::new(transport, sink, &config());

        let first = poller.cycle();
        assert_eq!(first.image, SubOutcome::Skipped);
        assert_eq!(first.sensor, SubOutcome::Published);
        assert_eq!(poller.stats().failures, 1);
        assert_eq!(poller.stats().timeouts, 0);

        let second = poller.cycle();
        assert_eq!(second.image, SubOutcome::Skipped);
        assert_eq!(second.sensor, SubOutcome::Skipped);
        assert_eq!(poller.stats().failures, 2);
        assert_eq!(poller.stats().timeouts, 1);
        assert_eq!(poller.phase(), PollPhase::Idle);

        let mut latest = LatestTelemetry::default();
        assert!(!latest.drain(&rx));
        assert_eq!(latest.sensor.as_deref(), Some("roll=2"));
    }

    #[test]
    fn test_sensor_polling_disabled() {
        let transport = ScriptedTransport::new(vec![]);
        let (sink, _rx) = ChannelSink::bounded(8);
        let cfg = LinkConfig {
            poll_sensor: false,
            ..config()
        };
        let mut poller = Poller::new(transport, sink, &cfg);
        let report = poller.cycle();
        assert_eq!(report.sensor, SubOutcome::Disabled);
        assert_eq!(poller.transport.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_shutdown_stops_run() {
        let transport = ScriptedTransport::new(vec![]);
        let (sink, _rx) = ChannelSink::bounded(8);
        let mut poller = Poller::new(transport, sink, &config());

        assert_eq!(poller.run_cycles(3), 3);
        poller.shutdown_handle().trigger();
        assert_eq!(poller.run_cycles(3), 0);
        poller.run();
        assert_eq!(poller.stats().cycles, 3);
    }
}
