/// 快照: 把当前画面保存为PNG
use crate::frame::Frame;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// 保存到 `dir/snapshot_<时间戳>.png`, 返回文件路径
pub fn save_frame(frame: &Frame, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("无法创建快照目录 {}", dir.display()))?;

    let path = dir.join(format!("snapshot_{}.png", crate::gen_time_string("-")));
    let image = frame
        .to_image()
        .context("帧数据长度与尺寸不一致")?;
    image
        .save(&path)
        .with_context(|| format!("保存快照失败 {}", path.display()))?;

    info!("📸 快照已保存: {}", path.display());
    Ok(path)
}
