use std::rc::Rc;

use bytes::Bytes;

use crate::{buffer::StreamClient, stream::Stream};

/// 接收流生命周期与就绪通知的应用回调。
///
/// # 契约 (What)
/// - 所有方法默认为空操作，实现方只需覆盖关心的事件；
/// - `handle_readable` / `handle_writable` 的 `client` 是流缓冲的临时借用，回调内部直接用它读写；
/// - `handle_disconnected` 的 `unsent_data` 为断开时尚未送达远端的数据块，按写入顺序排列；
/// - 方法以 `&self` 接收，需要记录状态的实现使用内部可变性。
pub trait StreamObserver {
    fn handle_connected(&self, stream: &Stream) {
        let _ = stream;
    }

    fn handle_readable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        let _ = (stream, client);
    }

    fn handle_writable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        let _ = (stream, client);
    }

    fn handle_disconnected(&self, stream: &Stream, unsent_data: &[Bytes]) {
        let _ = (stream, unsent_data);
    }
}

/// 按注册顺序将每个通知转发给全部子观察者。
#[derive(Clone, Default)]
pub struct CompositeStreamObserver {
    observers: Vec<Rc<dyn StreamObserver>>,
}

impl CompositeStreamObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_observers(observers: impl IntoIterator<Item = Rc<dyn StreamObserver>>) -> Self {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    pub fn push(&mut self, observer: Rc<dyn StreamObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for CompositeStreamObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeStreamObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl StreamObserver for CompositeStreamObserver {
    fn handle_connected(&self, stream: &Stream) {
        for observer in &self.observers {
            observer.handle_connected(stream);
        }
    }

    fn handle_readable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        for observer in &self.observers {
            observer.handle_readable(stream, client);
        }
    }

    fn handle_writable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        for observer in &self.observers {
            observer.handle_writable(stream, client);
        }
    }

    fn handle_disconnected(&self, stream: &Stream, unsent_data: &[Bytes]) {
        for observer in &self.observers {
            observer.handle_disconnected(stream, unsent_data);
        }
    }
}
