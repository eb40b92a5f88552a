/// 传输层 (Transport)
/// 每次交换: 新建UDP socket → 发送一个数据报 → 限时等待一个回复 → socket随作用域释放
use crate::config::{Endpoint, LinkConfig};
use crate::error::LinkError;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::debug;

/// 请求/回复传输接口
///
/// 实现者必须是自包含的: 每次调用独占自己的资源, 轮询线程与控制线程可以并发调用。
pub trait Transport: Send + Sync {
    /// 发送请求并等待至多一个回复
    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, LinkError>;

    /// 只发送, 不等待回复 (fire-and-forget)
    fn send(&self, request: &[u8]) -> Result<(), LinkError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, LinkError> {
        (**self).exchange(request)
    }

    fn send(&self, request: &[u8]) -> Result<(), LinkError> {
        (**self).send(request)
    }
}

/// UDP传输: 无连接, 无会话状态
#[derive(Debug, Clone)]
pub struct UdpTransport {
    endpoint: Endpoint,
    timeout: Duration,
    recv_buffer_size: usize,
}

impl UdpTransport {
    pub fn new(endpoint: Endpoint, timeout: Duration, recv_buffer_size: usize) -> Self {
        Self {
            endpoint,
            timeout,
            recv_buffer_size,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Result<Self, LinkError> {
        Ok(Self::new(
            config.endpoint()?,
            config.timeout(),
            config.recv_buffer_size,
        ))
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 绑定与端点同协议族的临时端口
    fn open_socket(&self) -> io::Result<UdpSocket> {
        let local: SocketAddr = match self.endpoint.addr() {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        UdpSocket::bind(local)
    }
}

impl Transport for UdpTransport {
    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, LinkError> {
        let socket = self.open_socket()?;
        // 零时长会被set_read_timeout拒绝
        socket.set_read_timeout(Some(self.timeout.max(Duration::from_millis(1))))?;
        socket.send_to(request, self.endpoint.addr())?;

        let mut buf = vec![0u8; self.recv_buffer_size];
        match socket.recv_from(&mut buf) {
            Ok((0, _)) => Err(LinkError::EmptyReply),
            Ok((n, from)) => {
                debug!("📥 收到 {} 字节 (来自 {})", n, from);
                buf.truncate(n);
                Ok(buf)
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Err(LinkError::Timeout)
            }
            Err(e) => Err(LinkError::Io(e)),
        }
        // socket在此处drop, 所有返回路径都会关闭
    }

    fn send(&self, request: &[u8]) -> Result<(), LinkError> {
        let socket = self.open_socket()?;
        socket.send_to(request, self.endpoint.addr())?;
        Ok(())
    }
}
