//! 测试替身：便于在不创建真实 Reactor 或套接字的前提下验证应用装配逻辑。
//!
//! # 设计定位（Why）
//! - [`FakeEventEmitter`] 只记录流与资源的对应关系，用于断言“是否注册 / 是否注销”；
//! - [`FakeStreamObserver`] 把收到的通知按顺序记入 [`NotificationLog`]，测试用期望日志整体比较；
//! - [`FakeStreamClient`] 是有容量上限的 FIFO，用于单独验证观察者的读写行为。
//!
//! 模块对下游公开，集成测试与应用测试均可直接使用。

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    fmt,
};

use bytes::Bytes;
use tracing::debug;

use crate::{
    buffer::StreamClient,
    emitter::EventEmitter,
    error::WriteLimitReached,
    observer::StreamObserver,
    resource::ResourceHandle,
    stream::{Stream, StreamId},
};

/// 只记录注册关系的事件发射器。
#[derive(Debug, Default)]
pub struct FakeEventEmitter {
    attached: RefCell<HashMap<StreamId, ResourceHandle>>,
}

impl FakeEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 流是否以指定资源注册在此。
    pub fn has_stream_with_resource(&self, stream: &Stream, resource: ResourceHandle) -> bool {
        self.attached.borrow().get(&stream.id()) == Some(&resource)
    }

    pub fn has_stream(&self, stream: &Stream) -> bool {
        self.attached.borrow().contains_key(&stream.id())
    }

    pub fn is_empty(&self) -> bool {
        self.attached.borrow().is_empty()
    }
}

impl EventEmitter for FakeEventEmitter {
    fn attach_stream(&self, stream: &Stream, resource: ResourceHandle) {
        self.attached.borrow_mut().insert(stream.id(), resource);
    }

    fn detach_stream(&self, stream: &Stream, resource: ResourceHandle) {
        if self.has_stream_with_resource(stream, resource) {
            self.attached.borrow_mut().remove(&stream.id());
        }
    }
}

/// 观察者收到的一条通知。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Connected(StreamId),
    /// 可读通知，附带观察者当时读到的数据。
    Readable(StreamId, Bytes),
    Writable(StreamId),
    /// 断开通知，附带未送达数据。
    Disconnected(StreamId, Vec<Bytes>),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Connected(id) => write!(f, "connected {id}"),
            Notification::Readable(id, data) => write!(f, "readable {id} {data:?}"),
            Notification::Writable(id) => write!(f, "writable {id}"),
            Notification::Disconnected(id, unsent) => {
                write!(f, "disconnected {id} {unsent:?}")
            }
        }
    }
}

/// 可整体比较的通知历史。
///
/// 既用于记录实际收到的通知，也用于以链式调用构造期望值：
///
/// ```
/// use spark_reactor::{InMemoryStreamBufferFactory, Stream};
/// use spark_reactor::test_stubs::NotificationLog;
///
/// let stream = Stream::new(InMemoryStreamBufferFactory::new().create());
/// let expected = NotificationLog::new()
///     .connected(&stream)
///     .readable(&stream, "hello")
///     .disconnected(&stream, ["unsent"]);
/// assert_eq!(expected.len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotificationLog {
    entries: Vec<Notification>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(self, stream: &Stream) -> Self {
        self.with(Notification::Connected(stream.id()))
    }

    pub fn readable(self, stream: &Stream, data: impl Into<Bytes>) -> Self {
        self.with(Notification::Readable(stream.id(), data.into()))
    }

    pub fn writable(self, stream: &Stream) -> Self {
        self.with(Notification::Writable(stream.id()))
    }

    pub fn disconnected<I>(self, stream: &Stream, unsent: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        let unsent = unsent.into_iter().map(Into::into).collect();
        self.with(Notification::Disconnected(stream.id(), unsent))
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn with(mut self, notification: Notification) -> Self {
        self.entries.push(notification);
        self
    }

    fn push(&mut self, notification: Notification) {
        self.entries.push(notification);
    }
}

impl fmt::Display for NotificationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// 记录全部通知的观察者。
///
/// 可读时读取客户端当前全部数据并记录；可写时先写入通过 [`with_write`](Self::with_write)
/// 预设的数据块，再记录通知。
#[derive(Debug, Default)]
pub struct FakeStreamObserver {
    writes: Vec<Bytes>,
    log: RefCell<NotificationLog>,
}

impl FakeStreamObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回追加了一块“可写时写入”数据的副本，原值不变。
    pub fn with_write(&self, data: impl Into<Bytes>) -> Self {
        let mut writes = self.writes.clone();
        writes.push(data.into());
        Self {
            writes,
            log: RefCell::new(self.log.borrow().clone()),
        }
    }

    /// 当前通知历史的快照。
    pub fn fetch_notifications(&self) -> NotificationLog {
        self.log.borrow().clone()
    }
}

impl StreamObserver for FakeStreamObserver {
    fn handle_connected(&self, stream: &Stream) {
        self.log
            .borrow_mut()
            .push(Notification::Connected(stream.id()));
    }

    fn handle_readable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        let data = client.read();
        self.log
            .borrow_mut()
            .push(Notification::Readable(stream.id(), data));
    }

    fn handle_writable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        for data in &self.writes {
            if let Err(err) = client.write(data.clone()) {
                debug!(stream = %stream.id(), error = %err, "fake observer write rejected");
            }
        }
        self.log
            .borrow_mut()
            .push(Notification::Writable(stream.id()));
    }

    fn handle_disconnected(&self, stream: &Stream, unsent_data: &[Bytes]) {
        self.log
            .borrow_mut()
            .push(Notification::Disconnected(stream.id(), unsent_data.to_vec()));
    }
}

/// 有容量上限的 FIFO 客户端；`read` 每次取出最早写入的一块。
#[derive(Debug)]
pub struct FakeStreamClient {
    limit: usize,
    chunks: VecDeque<Bytes>,
    size: usize,
    closed: bool,
}

impl FakeStreamClient {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            chunks: VecDeque::new(),
            size: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl StreamClient for FakeStreamClient {
    fn write(&mut self, data: Bytes) -> Result<(), WriteLimitReached> {
        if self.closed {
            return Err(WriteLimitReached::ConnectionUnavailable {
                requested: data.len(),
            });
        }
        if self.size + data.len() > self.limit {
            return Err(WriteLimitReached::BufferFull {
                requested: data.len(),
                buffered: self.size,
                limit: self.limit,
            });
        }
        self.size += data.len();
        self.chunks.push_back(data);
        Ok(())
    }

    fn read(&mut self) -> Bytes {
        match self.chunks.pop_front() {
            Some(chunk) => {
                self.size -= chunk.len();
                chunk
            }
            None => Bytes::new(),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InMemoryStreamBufferFactory;

    #[test]
    fn fake_client_reads_chunks_in_write_order() {
        let mut client = FakeStreamClient::new(10);
        client.write(Bytes::from_static(b"one")).unwrap();
        client.write(Bytes::from_static(b"two")).unwrap();
        assert_eq!(client.read(), "one");
        assert_eq!(client.read(), "two");
        assert!(client.read().is_empty());
    }

    #[test]
    fn fake_client_frees_capacity_on_read_and_rejects_after_close() {
        let mut client = FakeStreamClient::new(4);
        client.write(Bytes::from_static(b"1234")).unwrap();
        assert!(matches!(
            client.write(Bytes::from_static(b"5")),
            Err(WriteLimitReached::BufferFull { buffered: 4, .. })
        ));
        client.read();
        client.write(Bytes::from_static(b"5")).unwrap();
        client.close();
        assert!(client.is_closed());
        assert_eq!(
            client.write(Bytes::from_static(b"6")),
            Err(WriteLimitReached::ConnectionUnavailable { requested: 1 })
        );
    }

    #[test]
    fn fake_emitter_only_detaches_matching_resource() {
        let emitter = FakeEventEmitter::new();
        let stream = Stream::new(InMemoryStreamBufferFactory::new().create());
        let resource = ResourceHandle::from_raw(3);
        assert!(emitter.is_empty());

        emitter.attach_stream(&stream, resource);
        emitter.detach_stream(&stream, ResourceHandle::from_raw(4));
        assert!(emitter.has_stream_with_resource(&stream, resource));
        assert!(!emitter.has_stream_with_resource(&stream, ResourceHandle::from_raw(4)));

        emitter.detach_stream(&stream, resource);
        assert!(!emitter.has_stream(&stream));
        assert!(emitter.is_empty());
    }

    #[test]
    fn fake_observer_records_every_notification_kind() {
        let stream = Stream::new(InMemoryStreamBufferFactory::new().create());
        let observer = FakeStreamObserver::new().with_write("reply");
        let mut client = FakeStreamClient::new(64);
        client.write(Bytes::from_static(b"request")).unwrap();

        observer.handle_connected(&stream);
        observer.handle_readable(&stream, &mut client);
        observer.handle_writable(&stream, &mut client);
        observer.handle_disconnected(&stream, &[Bytes::from_static(b"left")]);

        assert_eq!(
            observer.fetch_notifications(),
            NotificationLog::new()
                .connected(&stream)
                .readable(&stream, "request")
                .writable(&stream)
                .disconnected(&stream, ["left"])
        );
        assert_eq!(client.read(), "reply");
    }

    #[test]
    fn with_write_leaves_original_observer_untouched() {
        let stream = Stream::new(InMemoryStreamBufferFactory::new().create());
        let base = FakeStreamObserver::new();
        let writer = base.with_write("a").with_write("b");
        let mut client = FakeStreamClient::new(8);

        base.handle_writable(&stream, &mut client);
        assert!(client.read().is_empty());

        writer.handle_writable(&stream, &mut client);
        assert_eq!(client.read(), "a");
        assert_eq!(client.read(), "b");
        assert_eq!(base.fetch_notifications().len(), 1);
        assert_eq!(writer.fetch_notifications().len(), 1);
    }
}
