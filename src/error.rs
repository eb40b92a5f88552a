//! 错误类型 (Error taxonomy)
//!
//! 本系统中没有致命错误: 轮询循环把所有 `LinkError` 视为"本轮无数据"。

use std::string::FromUtf8Error;
use thiserror::Error;

/// 链路错误: 传输 / 解码 / 显示缓冲
#[derive(Debug, Error)]
pub enum LinkError {
    /// 超时内未收到回复
    #[error("no reply within timeout")]
    Timeout,

    /// 发送或接收失败 (非超时)
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// 收到0字节的数据报
    #[error("empty reply datagram")]
    EmptyReply,

    /// 端点地址无法解析
    #[error("cannot resolve endpoint {0}")]
    Resolve(String),

    /// 图像数据损坏或截断
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// 传感器文本不是合法UTF-8
    #[error("sensor text is not valid utf-8: {0}")]
    InvalidText(#[from] FromUtf8Error),

    /// 帧尺寸与显示缓冲不一致 (Reject策略)
    #[error("frame is {actual:?}, display buffer is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// 帧尺寸超出纹理上限 (每边 u16)
    #[error("frame {width}x{height} exceeds texture limit {limit}")]
    FrameTooLarge { width: u32, height: u32, limit: u32 },
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        match self {
            LinkError::Timeout => true,
            LinkError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// 协议解析错误 (设备端视角)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command tag {0:?}")]
    UnknownTag(String),

    #[error("set_led payload shorter than its {0}-byte header")]
    ShortHeader(usize),

    #[error("malformed set_led trailer {0:?}")]
    BadTrailer(String),

    #[error("led target {0} out of range 0..=4")]
    TargetOutOfRange(u32),

    #[error("color channel {0} out of range 0..=255")]
    ChannelOutOfRange(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(LinkError::Timeout.is_timeout());
        let would_block = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert!(LinkError::from(would_block).is_timeout());
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(!LinkError::from(refused).is_timeout());
        assert!(!LinkError::EmptyReply.is_timeout());
    }
}
