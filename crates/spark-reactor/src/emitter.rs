use crate::{resource::ResourceHandle, stream::Stream};

/// Reactor 的注册契约。
///
/// # 契约 (What)
/// - `attach_stream`：登记 `resource → stream`，并向观察者发出 `connected` 通知；
/// - `detach_stream`：若该资源仍登记于此流，先发出 `disconnected` 通知再注销；
/// - 两个方法都在调用线程上同步完成，实现方不得在其中阻塞。
pub trait EventEmitter {
    fn attach_stream(&self, stream: &Stream, resource: ResourceHandle);

    fn detach_stream(&self, stream: &Stream, resource: ResourceHandle);
}
