use std::{
    cell::{Cell, RefCell, RefMut},
    fmt,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    buffer::{StreamBuffer, StreamClient},
    emitter::EventEmitter,
    observer::StreamObserver,
};

/// 流的进程内唯一标识。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// 流的生命周期状态；`Detached` 为终态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// 可附着到零个或多个 Reactor。
    Active,
    /// 连接已关闭或断开，已从所有 Reactor 注销。
    Detached,
}

struct StreamInner {
    id: StreamId,
    buffer: RefCell<Box<dyn StreamBuffer>>,
    emitters: RefCell<Vec<Weak<dyn EventEmitter>>>,
    unsent_data: RefCell<Vec<Bytes>>,
    state: Cell<StreamState>,
}

/// 将一个 [`StreamBuffer`] 与一个或多个 Reactor 耦合的缓冲流。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 把 Reactor 的就绪通知翻译为缓冲上的 IO 操作，再转交给观察者；
/// - 在每次读/写通知后拉取式地检查连接状态，一旦关闭或断开，就从所有 Reactor
///   注销并锁存未送达数据，保证 `disconnected` 通知恰好携带这些数据。
///
/// ## 逻辑 (How)
/// - 句柄内部以 `Rc` 共享，克隆得到的是同一条流；相等性按 [`StreamId`] 判断；
/// - 已附着的 Reactor 以弱引用保存，避免“注册表持有流、流持有 Reactor”形成引用环；
/// - 除交给观察者的 `StreamClient` 借用外，回调期间不持有任何内部借用。
///
/// ## 契约 (What)
/// - `notify_writable` 先冲刷写队列；只有远端未满时才让观察者追加数据并再次冲刷；
/// - 断开检测只会成功一次：锁存数据后流进入 [`StreamState::Detached`]，后续检查为空操作；
/// - **前置条件**：观察者在 `handle_*` 回调中不得再调用 [`Stream::buffer_mut`]，
///   缓冲此时已经以 `client` 参数的形式被借出。
#[derive(Clone)]
pub struct Stream {
    inner: Rc<StreamInner>,
}

impl Stream {
    pub fn new(buffer: impl StreamBuffer + 'static) -> Self {
        Self::from_boxed(Box::new(buffer))
    }

    pub fn from_boxed(buffer: Box<dyn StreamBuffer>) -> Self {
        Self {
            inner: Rc::new(StreamInner {
                id: StreamId::next(),
                buffer: RefCell::new(buffer),
                emitters: RefCell::new(Vec::new()),
                unsent_data: RefCell::new(Vec::new()),
                state: Cell::new(StreamState::Active),
            }),
        }
    }

    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    pub fn state(&self) -> StreamState {
        self.inner.state.get()
    }

    pub fn is_detached(&self) -> bool {
        self.state() == StreamState::Detached
    }

    /// 仍然存活的已附着 Reactor 数量。
    pub fn attached_count(&self) -> usize {
        self.inner
            .emitters
            .borrow()
            .iter()
            .filter(|emitter| emitter.strong_count() > 0)
            .count()
    }

    /// 断开时锁存的未送达数据；尚未断开时为空。
    pub fn unsent_data(&self) -> Vec<Bytes> {
        self.inner.unsent_data.borrow().clone()
    }

    /// 借出底层缓冲。
    ///
    /// # Panics
    /// 在观察者回调内部调用（缓冲已被借出）时 panic。
    pub fn buffer_mut(&self) -> RefMut<'_, dyn StreamBuffer> {
        RefMut::map(self.inner.buffer.borrow_mut(), |buffer| &mut **buffer)
    }

    /// 将底层资源注册到 `emitter`，由其发出 `connected` 通知。
    pub fn attach(&self, emitter: Rc<dyn EventEmitter>) {
        if self.is_detached() {
            warn!(stream = %self.id(), "attach ignored: stream is already detached");
            return;
        }
        let resource = self.inner.buffer.borrow().resource();
        if let Some(resource) = resource {
            emitter.attach_stream(self, resource);
        }
        self.inner.emitters.borrow_mut().push(Rc::downgrade(&emitter));
        debug!(stream = %self.id(), ?resource, "stream attached");
    }

    pub fn notify_readable(&self, observer: &dyn StreamObserver) {
        self.inner.buffer.borrow_mut().read_from_remote();
        {
            let mut buffer = self.inner.buffer.borrow_mut();
            let client: &mut dyn StreamClient = &mut **buffer;
            observer.handle_readable(self, client);
        }
        self.detach_when_connection_is_broken();
    }

    pub fn notify_writable(&self, observer: &dyn StreamObserver) {
        let remote_full = {
            let mut buffer = self.inner.buffer.borrow_mut();
            buffer.write_to_remote();
            buffer.is_remote_full()
        };
        if !remote_full {
            {
                let mut buffer = self.inner.buffer.borrow_mut();
                let client: &mut dyn StreamClient = &mut **buffer;
                observer.handle_writable(self, client);
            }
            self.inner.buffer.borrow_mut().write_to_remote();
        }
        self.detach_when_connection_is_broken();
    }

    pub fn notify_disconnected(&self, observer: &dyn StreamObserver) {
        let unsent_data = self.unsent_data();
        observer.handle_disconnected(self, &unsent_data);
    }

    fn detach_when_connection_is_broken(&self) {
        if self.is_detached() {
            return;
        }
        let mut flushed = None;
        self.inner
            .buffer
            .borrow_mut()
            .notify_connection_closed_or_broken(&mut |unsent| flushed = Some(unsent));
        let Some(unsent) = flushed else {
            return;
        };

        self.inner.state.set(StreamState::Detached);
        *self.inner.unsent_data.borrow_mut() = unsent;
        let emitters = std::mem::take(&mut *self.inner.emitters.borrow_mut());
        let resource = self.inner.buffer.borrow().resource();
        debug!(
            stream = %self.id(),
            emitters = emitters.len(),
            unsent_chunks = self.inner.unsent_data.borrow().len(),
            "connection closed or broken, detaching stream"
        );
        let Some(resource) = resource else {
            return;
        };
        for emitter in emitters.iter().filter_map(Weak::upgrade) {
            emitter.detach_stream(self, resource);
        }
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Stream {}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("attached", &self.inner.emitters.borrow().len())
            .finish()
    }
}

/// 以缓冲构造 [`Stream`] 的工厂。
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferedStreamFactory;

impl BufferedStreamFactory {
    pub fn create_from_buffer(&self, buffer: impl StreamBuffer + 'static) -> Stream {
        Stream::new(buffer)
    }
}
