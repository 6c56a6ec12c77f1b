//! 缓冲流契约与两种后端实现。
//!
//! # 设计定位（Why）
//! - [`StreamClient`] 是暴露给观察者的最小能力：写入、读取、关闭；
//! - [`StreamBuffer`] 在其之上补充与“远端”交换数据的操作，由 [`Stream`](crate::Stream)
//!   在每次就绪通知中驱动；
//! - 两个后端共享同一状态机：[`InMemoryStreamBuffer`] 以固定容量的内存管道模拟远端，
//!   使分块与背压行为完全确定；[`SocketStreamBuffer`] 面向真实的非阻塞套接字。
//!
//! # 契约说明（What）
//! - `write` 先检查连接是否可用，再委托 [`WriteBuffer`](crate::WriteBuffer) 追加；
//! - `read` 取走并清空读累加器，永不失败；
//! - `close` 幂等，半关闭读方向，保留待发送数据以便在断开通知中回交；
//! - `notify_connection_closed_or_broken` 只在连接关闭/断开后回调一次，回调参数为未送达数据。

mod memory;
mod socket;

pub use memory::{InMemoryStreamBuffer, InMemoryStreamBufferFactory};
pub use socket::{SocketStreamBuffer, SocketStreamBufferFactory};

use bytes::Bytes;

use crate::{emitter::EventEmitter, error::WriteLimitReached, resource::ResourceHandle, stream::Stream};

/// 观察者可见的连接操作。
pub trait StreamClient {
    /// 将数据排入写队列，等待下一次可写通知时发送。
    ///
    /// 超出写缓冲上限或连接不可用时返回 [`WriteLimitReached`]，且不修改缓冲。
    fn write(&mut self, data: Bytes) -> Result<(), WriteLimitReached>;

    /// 取走当前累积的全部入站数据；没有数据（包括连接断开后）时返回空块。
    fn read(&mut self) -> Bytes;

    /// 优雅关闭，可重复调用。
    fn close(&mut self);
}

/// 由 [`Stream`] 驱动的缓冲状态机。
pub trait StreamBuffer: StreamClient {
    /// 需要注册到 Reactor 的资源句柄；`None` 表示该缓冲不参与就绪轮询。
    fn resource(&self) -> Option<ResourceHandle>;

    /// 从远端拉取数据到读累加器，最多填满 `read_buffer_size`。
    fn read_from_remote(&mut self);

    /// 将写队列推送到远端，直至队列清空或远端无法继续接收。
    fn write_to_remote(&mut self);

    /// 远端是否暂时无法继续接收（已关闭的连接始终视为已满）。
    fn is_remote_full(&self) -> bool;

    /// 连接关闭或断开时，以未送达数据调用 `listener`；每个缓冲至多回调一次。
    fn notify_connection_closed_or_broken(&mut self, listener: &mut dyn FnMut(Vec<Bytes>));

    /// 将自身资源注册到 `emitter`；没有资源时为空操作。
    fn attach_resource_to_emitter(&self, stream: &Stream, emitter: &dyn EventEmitter) {
        if let Some(resource) = self.resource() {
            emitter.attach_stream(stream, resource);
        }
    }

    /// 从 `emitter` 注销自身资源；没有资源时为空操作。
    fn detach_resource_from_emitter(&self, stream: &Stream, emitter: &dyn EventEmitter) {
        if let Some(resource) = self.resource() {
            emitter.detach_stream(stream, resource);
        }
    }
}
