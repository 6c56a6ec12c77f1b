use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
};

use bytes::{Bytes, BytesMut};
use socket2::SockRef;
use tracing::{debug, trace, warn};

use super::{StreamBuffer, StreamClient};
use crate::{
    config::SocketBufferConfig,
    error::{
        self, IoDisposition, OperationKind, SocketSetupError, WriteLimitReached,
        classify_io_error, map_setup_error,
    },
    resource::ResourceHandle,
    write_buffer::WriteBuffer,
};

/// 面向真实非阻塞 TCP 套接字的缓冲实现。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 将套接字的部分写、`WouldBlock` 与对端断开统一折叠进 [`StreamBuffer`] 状态机，
///   使 [`Stream`](crate::Stream) 无需感知底层系统调用细节。
///
/// ## 逻辑 (How)
/// - 每次系统调用后按 [`io::ErrorKind`] 分类：`WouldBlock`/`Interrupted` 视为暂时不可用；
///   `BrokenPipe`、`ConnectionReset` 等断开类错误被锁存到 `broken`；
/// - 锁存后连接表现为永久关闭：写入被拒绝、不再收发，无需显式调用 `close`；
/// - 读到 EOF（读累加器尚有空间却收到 0 字节）只记录“对端已结束发送”：此后不再接收，
///   写方向保持可用，直到发送失败或本端调用 `close`。
///
/// ## 契约 (What)
/// - `write_to_remote` 逐块发送，遇到 0 字节或失败的发送即停止；短写将 `remote_full` 置位；
/// - `read_from_remote` 循环接收直到读累加器填满、套接字无数据可读或遇到 EOF；
/// - 对端半关闭后套接字持续报告可读，读到空数据的观察者应自行决定何时 `close`；
/// - `close` 半关闭读方向，待发送数据保留给断开通知。
///
/// ## 注意事项 (Trade-offs)
/// - 发送依赖标准库 `TcpStream::write`，在 Linux 上携带 `MSG_NOSIGNAL`，对端断开不会触发 `SIGPIPE`。
#[derive(Debug)]
pub struct SocketStreamBuffer {
    socket: TcpStream,
    read_buffer: BytesMut,
    read_buffer_size: usize,
    write_buffer: WriteBuffer,
    closed: bool,
    remote_full: bool,
    disconnect_reported: bool,
    read_closed: bool,
    last_error_kind: Option<io::ErrorKind>,
    broken: Option<io::ErrorKind>,
}

impl SocketStreamBuffer {
    /// 包装一个已设置为非阻塞的套接字。通常经由 [`SocketStreamBufferFactory`] 创建。
    pub fn new(socket: TcpStream, read_buffer_size: usize, write_buffer: WriteBuffer) -> Self {
        Self {
            socket,
            read_buffer: BytesMut::with_capacity(read_buffer_size),
            read_buffer_size,
            write_buffer,
            closed: false,
            remote_full: false,
            disconnect_reported: false,
            read_closed: false,
            last_error_kind: None,
            broken: None,
        }
    }

    /// 最近一次系统调用观察到的错误类别。
    pub fn last_error_kind(&self) -> Option<io::ErrorKind> {
        self.last_error_kind
    }

    /// 连接是否已被判定为断开。
    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    /// 对端是否已结束发送（读到 EOF）。
    pub fn is_read_closed(&self) -> bool {
        self.read_closed
    }

    pub fn socket(&self) -> &TcpStream {
        &self.socket
    }

    fn is_connection_unavailable(&self) -> bool {
        self.closed || self.broken.is_some()
    }

    fn observe_error(&mut self, kind: OperationKind, error: &io::Error) -> IoDisposition {
        let disposition = classify_io_error(error);
        self.last_error_kind = Some(error.kind());
        match disposition {
            IoDisposition::Transient => {}
            IoDisposition::Broken => self.latch_broken(kind, error.kind()),
            IoDisposition::Other => {
                warn!(code = kind.code, error = %error, "{} failed", kind.message);
            }
        }
        disposition
    }

    fn latch_broken(&mut self, kind: OperationKind, error_kind: io::ErrorKind) {
        if self.broken.is_none() {
            debug!(
                code = kind.code,
                error_kind = ?error_kind,
                pending_bytes = self.write_buffer.len(),
                "connection latched as broken"
            );
            self.broken = Some(error_kind);
        }
    }
}

impl StreamClient for SocketStreamBuffer {
    fn write(&mut self, data: Bytes) -> Result<(), WriteLimitReached> {
        if self.is_connection_unavailable() {
            return Err(WriteLimitReached::ConnectionUnavailable {
                requested: data.len(),
            });
        }
        self.write_buffer.append(data)
    }

    fn read(&mut self) -> Bytes {
        self.read_buffer.split().freeze()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!(
            pending_bytes = self.write_buffer.len(),
            "close requested, shutting down read side"
        );
        if let Err(err) = SockRef::from(&self.socket).shutdown(Shutdown::Read) {
            self.observe_error(error::SHUTDOWN, &err);
        }
    }
}

impl StreamBuffer for SocketStreamBuffer {
    fn resource(&self) -> Option<ResourceHandle> {
        Some(ResourceHandle::of(&self.socket))
    }

    fn read_from_remote(&mut self) {
        if self.is_connection_unavailable() || self.read_closed {
            return;
        }
        while self.read_buffer.len() < self.read_buffer_size {
            let filled = self.read_buffer.len();
            self.read_buffer.resize(self.read_buffer_size, 0);
            let result = self.socket.read(&mut self.read_buffer[filled..]);
            match result {
                Ok(0) => {
                    self.read_buffer.truncate(filled);
                    self.read_closed = true;
                    debug!(
                        pending_bytes = self.write_buffer.len(),
                        "remote finished sending, read side closed"
                    );
                    break;
                }
                Ok(received) => self.read_buffer.truncate(filled + received),
                Err(err) => {
                    self.read_buffer.truncate(filled);
                    if self.observe_error(error::READ, &err) != IoDisposition::Transient
                        || err.kind() == io::ErrorKind::WouldBlock
                    {
                        break;
                    }
                }
            }
        }
    }

    fn write_to_remote(&mut self) {
        if self.is_connection_unavailable() {
            return;
        }
        self.remote_full = false;
        while !self.write_buffer.is_empty() {
            let data = self.write_buffer.current_value();
            match self.socket.write(&data) {
                Ok(0) => {
                    self.remote_full = true;
                    break;
                }
                Ok(sent) => {
                    self.remote_full = sent < data.len();
                    if self.remote_full {
                        trace!(sent, offered = data.len(), "short write to remote");
                    }
                    self.write_buffer.handle_written_bytes(sent);
                }
                Err(err) => {
                    self.remote_full = true;
                    self.observe_error(error::WRITE, &err);
                    break;
                }
            }
        }
    }

    fn is_remote_full(&self) -> bool {
        self.is_connection_unavailable() || self.remote_full
    }

    fn notify_connection_closed_or_broken(&mut self, listener: &mut dyn FnMut(Vec<Bytes>)) {
        if self.is_connection_unavailable() && !self.disconnect_reported {
            self.disconnect_reported = true;
            listener(self.write_buffer.flush_not_written_items());
        }
    }
}

/// 将已连接的 `TcpStream` 包装为 [`SocketStreamBuffer`] 的不可变配置值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketStreamBufferFactory {
    read_buffer_size: usize,
    write_buffer_size: usize,
    send_buffer_size: Option<usize>,
}

impl Default for SocketStreamBufferFactory {
    fn default() -> Self {
        Self::from_config(&SocketBufferConfig::default())
    }
}

impl SocketStreamBufferFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SocketBufferConfig) -> Self {
        Self {
            read_buffer_size: config.read_buffer_size,
            write_buffer_size: config.write_buffer_size,
            send_buffer_size: config.send_buffer_size,
        }
    }

    /// 调整读累加器上限。
    pub fn with_read_buffer(&self, size: usize) -> Self {
        Self {
            read_buffer_size: size,
            ..self.clone()
        }
    }

    /// 调整写队列上限。
    pub fn with_write_buffer(&self, size: usize) -> Self {
        Self {
            write_buffer_size: size,
            ..self.clone()
        }
    }

    /// 设置内核发送缓冲（`SO_SNDBUF`）。
    pub fn with_send_buffer(&self, size: usize) -> Self {
        Self {
            send_buffer_size: Some(size),
            ..self.clone()
        }
    }

    /// 将套接字切换为非阻塞模式并包装为缓冲。
    pub fn create_from_socket(
        &self,
        socket: TcpStream,
    ) -> Result<SocketStreamBuffer, SocketSetupError> {
        socket
            .set_nonblocking(true)
            .map_err(|err| map_setup_error(error::CONFIGURE, err))?;
        if let Some(size) = self.send_buffer_size {
            SockRef::from(&socket)
                .set_send_buffer_size(size)
                .map_err(|err| map_setup_error(error::CONFIGURE, err))?;
        }
        Ok(SocketStreamBuffer::new(
            socket,
            self.read_buffer_size,
            WriteBuffer::new(self.write_buffer_size),
        ))
    }
}
