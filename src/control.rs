/// LED控制 (Control sink)
/// UI → 控制通道 → set_led 数据报, 发完即走, 不等待回复
use crate::protocol::{Command, LedTarget, Rgb8};
use crate::transport::Transport;
use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{info, warn};

/// UI发出的控制消息
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    SetLed { target: LedTarget, color: Rgb8 },
    /// 取色器原始浮点分量 (0.0-1.0), 在这里截断为0-255
    SetLedUnit { target: LedTarget, rgb: [f32; 3] },
    Shutdown,
}

pub struct ControlSink<T> {
    transport: T,
}

impl<T: Transport> ControlSink<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// 同步发送一次LED命令; 失败只记日志, 返回值只用于测试/统计
    pub fn send_actuator_command(&self, target: LedTarget, color: Rgb8) -> bool {
        let cmd = Command::SetActuator { target, color };
        match self.transport.send(&cmd.encode()) {
            Ok(()) => {
                info!(
                    "💡 {} ← ({}, {}, {})",
                    target, color.r, color.g, color.b
                );
                true
            }
            Err(e) => {
                warn!("❌ set_led 发送失败: {}", e);
                false
            }
        }
    }

    /// 处理一条消息, 返回false表示应当退出
    pub fn handle(&self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::SetLed { target, color } => {
                self.send_actuator_command(target, color);
                true
            }
            ControlMessage::SetLedUnit { target, rgb: [r, g, b] } => {
                self.send_actuator_command(target, Rgb8::from_unit(r, g, b));
                true
            }
            ControlMessage::Shutdown => false,
        }
    }

    /// 消费控制通道直到Shutdown或发送端全部关闭
    pub fn run(&self, rx: Receiver<ControlMessage>) {
        info!("🎛️ 控制线程启动");
        while let Ok(msg) = rx.recv() {
            if !self.handle(msg) {
                break;
            }
        }
        info!("❌ 控制线程退出");
    }
}

impl<T: Transport + 'static> ControlSink<T> {
    /// 启动控制线程, 返回UI端使用的发送器
    pub fn spawn(self) -> std::io::Result<(Sender<ControlMessage>, JoinHandle<()>)> {
        // 无界: UI线程发送时绝不阻塞
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("control".to_string())
            .spawn(move || self.run(rx))?;
        Ok((tx, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    impl Transport for RecordingTransport {
        fn exchange(&self, _request: &[u8]) -> Result<Vec<u8>, LinkError> {
            Err(LinkError::Timeout)
        }

        fn send(&self, request: &[u8]) -> Result<(), LinkError> {
            if self.fail {
                return Err(LinkError::Io(std::io::ErrorKind::ConnectionRefused.into()));
            }
            self.sent.lock().unwrap().push(request.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_unit_color_is_truncated() {
        let transport = Arc::new(RecordingTransport::default());
        let sink = ControlSink::new(transport.clone());
        assert!(sink.handle(ControlMessage::SetLedUnit {
            target: LedTarget::All,
            rgb: [1.0, 0.0, 0.5],
        }));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][128..], b"4 255 0 127\0");
    }

    #[test]
    fn test_failure_is_swallowed() {
        let sink = ControlSink::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        assert!(!sink.send_actuator_command(LedTarget::Single(0), Rgb8::new(1, 2, 3)));
        assert!(sink.handle(ControlMessage::SetLed {
            target: LedTarget::Single(0),
            color: Rgb8::default(),
        }));
    }

    #[test]
    fn test_worker_exits_on_shutdown() {
        let transport = Arc::new(RecordingTransport::default());
        let (tx, handle) = ControlSink::new(transport.clone()).spawn().unwrap();
        tx.send(ControlMessage::SetLed {
            target: LedTarget::Single(3),
            color: Rgb8::new(0, 0, 255),
        })
        .unwrap();
        tx.send(ControlMessage::Shutdown).unwrap();
        handle.join().unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(&sent[0][128..], b"3 0 0 255\0");
    }
}
