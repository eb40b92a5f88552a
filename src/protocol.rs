/// 命令编解码模块
/// Command codec for the device wire protocol
///
/// - `get_camera`: 请求一帧JPEG
/// - `get_imu`:    请求姿态文本
/// - `set_led`:    128字节定长头 + "<target> <r> <g> <b>\0"
use crate::error::ProtocolError;
use std::fmt;

pub const TAG_FETCH_IMAGE: &[u8] = b"get_camera";
pub const TAG_FETCH_SENSOR: &[u8] = b"get_imu";
pub const TAG_SET_ACTUATOR: &str = "set_led";

/// set_led 定长头长度
pub const HEADER_LEN: usize = 128;

/// LED目标: 单个灯 (0..=3) 或全部 (4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedTarget {
    Single(u8),
    All,
}

impl LedTarget {
    pub const ALL_INDEX: u8 = 4;

    /// 从线上编号构造, 超出 0..=4 返回None
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0..=3 => Some(LedTarget::Single(index)),
            Self::ALL_INDEX => Some(LedTarget::All),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            LedTarget::Single(i) => *i,
            LedTarget::All => Self::ALL_INDEX,
        }
    }

    /// UI下拉框的全部选项
    pub fn choices() -> [LedTarget; 5] {
        [
            LedTarget::Single(0),
            LedTarget::Single(1),
            LedTarget::Single(2),
            LedTarget::Single(3),
            LedTarget::All,
        ]
    }
}

impl fmt::Display for LedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedTarget::Single(i) => write!(f, "LED {}", i),
            LedTarget::All => write!(f, "全部"),
        }
    }
}

/// 8位RGB颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 取色器的 0.0-1.0 浮点分量 → 0-255, 截断取整
    ///
    /// `as u8` 饱和转换: 越界值被夹到 0/255, NaN 变为 0。
    pub fn from_unit(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: (r * 255.0) as u8,
            g: (g * 255.0) as u8,
            b: (b * 255.0) as u8,
        }
    }
}

/// 请求命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    FetchImage,
    FetchSensor,
    SetActuator { target: LedTarget, color: Rgb8 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::FetchImage => "get_camera",
            Command::FetchSensor => "get_imu",
            Command::SetActuator { .. } => TAG_SET_ACTUATOR,
        }
    }

    /// 编码为单个数据报
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::FetchImage => TAG_FETCH_IMAGE.to_vec(),
            Command::FetchSensor => TAG_FETCH_SENSOR.to_vec(),
            Command::SetActuator { target, color } => {
                let trailer = format!("{} {} {} {}\0", target.index(), color.r, color.g, color.b);
                let mut buf = Vec::with_capacity(HEADER_LEN + trailer.len());
                buf.extend_from_slice(&fixed_header(TAG_SET_ACTUATOR));
                buf.extend_from_slice(trailer.as_bytes());
                buf
            }
        }
    }

    /// 解析数据报 (设备端使用, 同时用于测试往返)
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes == TAG_FETCH_IMAGE {
            return Ok(Command::FetchImage);
        }
        if bytes == TAG_FETCH_SENSOR {
            return Ok(Command::FetchSensor);
        }

        let tag_len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        if &bytes[..tag_len] != TAG_SET_ACTUATOR.as_bytes() {
            return Err(ProtocolError::UnknownTag(
                String::from_utf8_lossy(&bytes[..tag_len.min(32)]).into_owned(),
            ));
        }
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::ShortHeader(HEADER_LEN));
        }

        let (target, color) = parse_trailer(&bytes[HEADER_LEN..])?;
        Ok(Command::SetActuator { target, color })
    }
}

/// 生成定长头: 不足补 `\0`, 超长截断, 长度恒为 HEADER_LEN
pub fn fixed_header(name: &str) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    let src = name.as_bytes();
    let n = src.len().min(HEADER_LEN);
    header[..n].copy_from_slice(&src[..n]);
    header
}

fn parse_trailer(trailer: &[u8]) -> Result<(LedTarget, Rgb8), ProtocolError> {
    let end = trailer.iter().position(|&b| b == 0).unwrap_or(trailer.len());
    let text = std::str::from_utf8(&trailer[..end])
        .map_err(|_| ProtocolError::BadTrailer(String::from_utf8_lossy(trailer).into_owned()))?;

    let bad = || ProtocolError::BadTrailer(text.to_string());
    let fields = text
        .split_whitespace()
        .map(|s| s.parse::<u32>().map_err(|_| bad()))
        .collect::<Result<Vec<_>, _>>()?;
    let &[target, r, g, b] = fields.as_slice() else {
        return Err(bad());
    };

    let target = u8::try_from(target)
        .ok()
        .and_then(LedTarget::from_index)
        .ok_or(ProtocolError::TargetOutOfRange(target))?;
    let channel = |v: u32| u8::try_from(v).map_err(|_| ProtocolError::ChannelOutOfRange(v));

    Ok((target, Rgb8::new(channel(r)?, channel(g)?, channel(b)?)))
}
