//! 链路配置 - 通过JSON文件调整参数

use crate::error::LinkError;
use crate::frame::DimensionPolicy;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "远程相机/IMU 实时查看与LED控制", long_about = None)]
pub struct Args {
    /// 配置文件路径 (不存在时自动创建)
    #[arg(short, long, default_value = "camlink.json")]
    pub config: String,

    /// 设备地址 (覆盖配置文件)
    #[arg(long)]
    pub host: Option<String>,

    /// 设备端口 (覆盖配置文件)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 接收超时毫秒数 (覆盖配置文件)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Args {
    /// 加载配置文件并应用命令行覆盖
    pub fn resolve(&self) -> LinkConfig {
        let mut config = LinkConfig::load(&self.config);
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        config
    }
}

/// 设备端点 (进程生命周期内不可变)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    addr: SocketAddr,
}

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// 解析 host:port, 取第一个地址
    pub fn resolve(host: &str, port: u16) -> Result<Self, LinkError> {
        (host, port)
            .to_socket_addrs()
            .map_err(|e| LinkError::Resolve(format!("{}:{} ({})", host, port, e)))?
            .next()
            .map(Self::new)
            .ok_or_else(|| LinkError::Resolve(format!("{}:{}", host, port)))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// 链路参数配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    // === 设备端点 ===
    pub host: String,
    pub port: u16,

    // === 传输参数 ===
    pub timeout_ms: u64,         // 单次交换的接收超时
    pub recv_buffer_size: usize, // 接收缓冲区大小 (单个数据报上限)

    // === 轮询参数 ===
    pub cycle_yield_ms: u64, // 每轮之间的最小让出时间, 防止空转
    pub poll_sensor: bool,   // 是否同时轮询IMU

    // === 显示参数 ===
    pub display_width: u32,
    pub display_height: u32,
    pub dimension_policy: DimensionPolicy,

    // === 快照 ===
    pub snapshot_dir: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.178.27".to_string(),
            port: 3333,

            timeout_ms: 1000,
            recv_buffer_size: 65536,

            cycle_yield_ms: 1,
            poll_sensor: true,

            display_width: 640,
            display_height: 480,
            dimension_policy: DimensionPolicy::Resize,

            snapshot_dir: "snapshots".to_string(),
        }
    }
}

impl LinkConfig {
    /// 从JSON文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => warn!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn endpoint(&self) -> Result<Endpoint, LinkError> {
        Endpoint::resolve(&self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cycle_yield(&self) -> Duration {
        Duration::from_millis(self.cycle_yield_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前链路配置:");
        info!("  设备: {}:{}", self.host, self.port);
        info!("  超时: {} ms | 接收缓冲: {} B", self.timeout_ms, self.recv_buffer_size);
        info!(
            "  显示缓冲: {}x{} ({:?})",
            self.display_width, self.display_height, self.dimension_policy
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LinkConfig::default();
        assert_eq!(config.port, 3333);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.recv_buffer_size, 65536);
        assert_eq!((config.display_width, config.display_height), (640, 480));
        assert_eq!(config.dimension_policy, DimensionPolicy::Resize);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"host": "10.0.0.7", "dimension_policy": "reject"}"#)
                .unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 3333);
        assert_eq!(config.dimension_policy, DimensionPolicy::Reject);
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = std::env::temp_dir().join(format!("camlink-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("camlink.json");
        let _ = fs::remove_file(&path);

        let config = LinkConfig::load(&path);
        assert_eq!(config, LinkConfig::default());
        assert!(path.exists());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(LinkConfig::load(&path), LinkConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_args_override() {
        let dir = std::env::temp_dir().join(format!("camlink-args-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("camlink.json");
        let args = Args::parse_from([
            "viewer",
            "--config",
            path.to_str().unwrap(),
            "--host",
            "127.0.0.1",
            "--port",
            "4444",
            "--timeout-ms",
            "250",
        ]);
        let config = args.resolve();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4444);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(
            config.endpoint().unwrap().addr(),
            "127.0.0.1:4444".parse::<SocketAddr>().unwrap()
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
