//! 帧解码模块 - 数据报 → 显示就绪的像素缓冲
//!
//! 显示端约定: RGBA四通道, 行序已翻转, 每通道 0.0-1.0 浮点

use crate::error::LinkError;
use image::{ImageBuffer, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 解码后的单帧
#[derive(Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<f32>, // width * height * 4
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Frame {
    pub const CHANNELS: usize = 4;

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// (x, y) 处的 RGBA, 越界返回None
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        let px = &self.data[idx..idx + Self::CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// 转回8位RGBA (纹理上传 / 保存快照)
    pub fn to_rgba8(&self) -> Vec<u8> {
        unit_to_rgba8(&self.data)
    }

    pub fn to_image(&self) -> Option<RgbaImage> {
        ImageBuffer::<Rgba<u8>, _>::from_raw(self.width, self.height, self.to_rgba8())
    }

    /// 纹理尺寸 (每边最多 u16::MAX), 超出时返回错误而不是截断
    pub fn texture_size(&self) -> Result<(u16, u16), LinkError> {
        match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(w), Ok(h)) => Ok((w, h)),
            _ => Err(LinkError::FrameTooLarge {
                width: self.width,
                height: self.height,
                limit: u16::MAX as u32,
            }),
        }
    }
}

fn unit_to_rgba8(data: &[f32]) -> Vec<u8> {
    data.iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

/// 将回复解释为完整的压缩图像 (JPEG等) 并归一化
///
/// 畸形或截断的数据返回 `LinkError::Decode`, 不会panic。
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, LinkError> {
    if bytes.is_empty() {
        return Err(LinkError::EmptyReply);
    }

    // image解出的是RGB顺序, 补alpha后直接满足显示端
    let decoded = image::load_from_memory(bytes)?;

    // 设备的相机是倒装的
    let rgba = decoded.flipv().into_rgba8();
    let (width, height) = rgba.dimensions();

    let data = rgba
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    Ok(Frame {
        width,
        height,
        data,
    })
}

/// IMU回复: UTF-8文本, 去掉尾部的 `\0` 和空白
pub fn decode_sensor_text(bytes: Vec<u8>) -> Result<String, LinkError> {
    let text = String::from_utf8(bytes)?;
    Ok(text
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string())
}

/// 帧尺寸与显示缓冲不一致时的处理策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// 按帧尺寸重新分配显示缓冲
    #[default]
    Resize,
    /// 丢弃尺寸不符的帧, 保留上一帧
    Reject,
}

/// 显示端的定长纹理缓冲 (初始 640x480, 全零)
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
    policy: DimensionPolicy,
    filled: bool, // 是否已接受过至少一帧
}

impl DisplayBuffer {
    pub fn new(width: u32, height: u32, policy: DimensionPolicy) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * Frame::CHANNELS],
            policy,
            filled: false,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// 纹理上传用的8位RGBA
    pub fn to_rgba8(&self) -> Vec<u8> {
        unit_to_rgba8(&self.data)
    }

    /// 用新帧覆盖缓冲; Reject策略下尺寸不符返回错误且缓冲不变
    pub fn apply(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let actual = (frame.width, frame.height);
        if actual != self.dimensions() {
            match self.policy {
                DimensionPolicy::Reject => {
                    return Err(LinkError::DimensionMismatch {
                        expected: self.dimensions(),
                        actual,
                    });
                }
                DimensionPolicy::Resize => {
                    info!(
                        "🔁 显示缓冲 {}x{} → {}x{}",
                        self.width, self.height, frame.width, frame.height
                    );
                    self.width = frame.width;
                    self.height = frame.height;
                }
            }
        }
        self.data.clear();
        self.data.extend_from_slice(&frame.data);
        self.filled = true;
        Ok(())
    }

    /// 当前显示的画面; 还没有接受过帧时为None
    pub fn snapshot(&self) -> Option<Frame> {
        self.filled.then(|| Frame {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        })
    }
}
