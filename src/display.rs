/// 显示端接口 (Display sink)
///
/// 轮询线程是唯一写入者; 画面与IMU文本相互独立地更新。
use crate::frame::Frame;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::debug;

/// 轮询线程 → 渲染线程 的消息
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Frame(Frame),
    Sensor(String),
    /// 瞬时帧率 (两次成功解码间隔的倒数)
    Fps(f64),
}

/// 显示端: 发布必须是非阻塞的
pub trait DisplaySink: Send {
    fn publish_frame(&self, frame: Frame);
    fn publish_sensor(&self, text: String);
    fn publish_fps(&self, _fps: f64) {}
}

/// 基于有界通道的显示端, 渲染跟不上时丢弃最旧的消息
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<TelemetryEvent>,
    // 通道满时从队头腾出位置, 保证最新的消息能进去
    overflow: Receiver<TelemetryEvent>,
}

impl ChannelSink {
    /// 队列很短: 画面只需要最新一帧
    pub fn bounded(capacity: usize) -> (Self, Receiver<TelemetryEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let sink = Self {
            tx,
            overflow: rx.clone(),
        };
        (sink, rx)
    }

    fn post(&self, mut event: TelemetryEvent) {
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    // 渲染端可能同时在取, 取不到说明已经有空位了
                    if self.overflow.try_recv().is_ok() {
                        debug!("渲染通道已满, 丢弃最旧的一条消息");
                    }
                    event = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("渲染端已退出");
                    return;
                }
            }
        }
    }
}

impl DisplaySink for ChannelSink {
    fn publish_frame(&self, frame: Frame) {
        self.post(TelemetryEvent::Frame(frame));
    }

    fn publish_sensor(&self, text: String) {
        self.post(TelemetryEvent::Sensor(text));
    }

    fn publish_fps(&self, fps: f64) {
        self.post(TelemetryEvent::Fps(fps));
    }
}

/// 渲染端持有的最新状态, 只保留最后一帧
#[derive(Debug, Default, Clone)]
pub struct LatestTelemetry {
    pub frame: Option<Frame>,
    pub sensor: Option<String>,
    pub fps: f64,
}

impl LatestTelemetry {
    /// 取出通道中积压的全部消息; 返回是否收到了新帧
    pub fn drain(&mut self, rx: &Receiver<TelemetryEvent>) -> bool {
        let mut new_frame = false;
        for event in rx.try_iter() {
            match event {
                TelemetryEvent::Frame(frame) => {
                    self.frame = Some(frame);
                    new_frame = true;
                }
                TelemetryEvent::Sensor(text) => self.sensor = Some(text),
                TelemetryEvent::Fps(fps) => self.fps = fps,
            }
        }
        new_frame
    }
}
