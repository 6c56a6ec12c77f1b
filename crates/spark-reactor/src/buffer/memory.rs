use bytes::{Bytes, BytesMut};

use super::{StreamBuffer, StreamClient};
use crate::{
    config::MemoryBufferConfig, error::WriteLimitReached, resource::ResourceHandle,
    write_buffer::WriteBuffer,
};

/// 以内存管道充当远端的回环缓冲。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 不依赖操作系统即可复现分块、背压与断开语义，供契约测试使用；
/// - 写入远端的数据会进入容量为 `chunk_size` 的管道，随后可被 `read_from_remote`
///   读回，因此同一个缓冲既是生产者也是消费者。
///
/// ## 逻辑 (How)
/// - `write_to_remote` 在搬运前记录“管道是否已无剩余容量”作为 `remote_full`，
///   随后从写队列逐块搬运，直至队列为空或管道填满；恰好填满管道不算远端已满，
///   下一次搬运时若管道仍未被读出才会报告；
/// - `read_from_remote` 把管道内容搬入读累加器，最多填满 `read_buffer_size`。
///
/// ## 契约 (What)
/// - 关闭后写入被拒绝、`write_to_remote` 不再搬运；已在读累加器与管道中的数据仍可读取；
/// - 未配置自定义资源时，Reactor 的注册/注销均为空操作。
#[derive(Debug)]
pub struct InMemoryStreamBuffer {
    pipe: BytesMut,
    read_buffer: BytesMut,
    write_buffer: WriteBuffer,
    read_buffer_size: usize,
    chunk_size: usize,
    closed: bool,
    remote_full: bool,
    disconnect_reported: bool,
    resource: Option<ResourceHandle>,
}

impl InMemoryStreamBuffer {
    pub fn new(
        chunk_size: usize,
        read_buffer_size: usize,
        write_buffer: WriteBuffer,
        resource: Option<ResourceHandle>,
    ) -> Self {
        Self {
            pipe: BytesMut::with_capacity(chunk_size),
            read_buffer: BytesMut::with_capacity(read_buffer_size),
            write_buffer,
            read_buffer_size,
            chunk_size,
            closed: false,
            remote_full: false,
            disconnect_reported: false,
            resource,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl StreamClient for InMemoryStreamBuffer {
    fn write(&mut self, data: Bytes) -> Result<(), WriteLimitReached> {
        if self.closed {
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
        self.closed = true;
    }
}

impl StreamBuffer for InMemoryStreamBuffer {
    fn resource(&self) -> Option<ResourceHandle> {
        self.resource
    }

    fn read_from_remote(&mut self) {
        let remaining = self.read_buffer_size.saturating_sub(self.read_buffer.len());
        let read_size = remaining.min(self.pipe.len());
        if read_size == 0 {
            return;
        }
        let data = self.pipe.split_to(read_size);
        self.read_buffer.extend_from_slice(&data);
    }

    fn write_to_remote(&mut self) {
        if self.closed {
            return;
        }
        let mut remaining = self.chunk_size.saturating_sub(self.pipe.len());
        self.remote_full = remaining == 0;
        while !self.write_buffer.is_empty() && remaining > 0 {
            let item = self.write_buffer.current_value();
            let accepted = item.len().min(remaining);
            self.pipe.extend_from_slice(&item[..accepted]);
            self.write_buffer.handle_written_bytes(accepted);
            remaining -= accepted;
        }
    }

    fn is_remote_full(&self) -> bool {
        self.closed || self.remote_full
    }

    fn notify_connection_closed_or_broken(&mut self, listener: &mut dyn FnMut(Vec<Bytes>)) {
        if self.closed && !self.disconnect_reported {
            self.disconnect_reported = true;
            listener(self.write_buffer.flush_not_written_items());
        }
    }
}

/// 构造 [`InMemoryStreamBuffer`] 的不可变配置值。
///
/// 每个 `with_*` 方法返回修改后的新值，原值保持不变，中间状态之间不存在共享可变数据。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InMemoryStreamBufferFactory {
    write_buffer_size: usize,
    read_buffer_size: usize,
    chunk_size: usize,
    resource: Option<ResourceHandle>,
}

impl Default for InMemoryStreamBufferFactory {
    fn default() -> Self {
        Self::from_config(&MemoryBufferConfig::default())
    }
}

impl InMemoryStreamBufferFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以配置段构造工厂。
    pub fn from_config(config: &MemoryBufferConfig) -> Self {
        Self {
            write_buffer_size: config.write_buffer_size,
            read_buffer_size: config.read_buffer_size,
            chunk_size: config.chunk_size,
            resource: None,
        }
    }

    pub fn with_write_buffer(&self, size: usize) -> Self {
        Self {
            write_buffer_size: size,
            ..self.clone()
        }
    }

    pub fn with_read_buffer(&self, size: usize) -> Self {
        Self {
            read_buffer_size: size,
            ..self.clone()
        }
    }

    pub fn with_chunk_size(&self, size: usize) -> Self {
        Self {
            chunk_size: size,
            ..self.clone()
        }
    }

    /// 指定注册到 Reactor 的资源句柄。缓冲本身不会对该资源做任何 IO。
    pub fn with_custom_resource(&self, resource: ResourceHandle) -> Self {
        Self {
            resource: Some(resource),
            ..self.clone()
        }
    }

    pub fn create(&self) -> InMemoryStreamBuffer {
        InMemoryStreamBuffer::new(
            self.chunk_size,
            self.read_buffer_size,
            WriteBuffer::new(self.write_buffer_size),
            self.resource,
        )
    }
}
