//! 单线程、电平触发的 Reactor。
//!
//! # 设计定位（Why）
//! - 每次 `tick` 先运行 worker，再以零超时轮询全部已注册资源，把就绪事件翻译为
//!   [`Stream`] 上的读写通知；
//! - 只有在“本轮没有任何资源可读”时才运行 idle worker，使空闲任务不会与 IO 争用一次 tick；
//! - 就绪轮询抽象为 [`ReadinessPoller`]，默认实现为基于 `poll(2)` 的 [`SystemPoller`]。
//!
//! # 契约说明（What）
//! - 注册表按插入顺序保存 `资源 → 流`，所有可读通知先于任何可写通知分发，二者都遵循注册顺序；
//! - 分发时跳过在本轮早先已被注销的资源；
//! - `tick` 不向调用方返回错误：轮询失败记录日志并视为本轮无活动。

mod builder;
mod poll;

pub use builder::ReactorBuilder;
pub use poll::{Readiness, ReadinessPoller, SystemPoller};

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use tracing::{debug, trace, warn};

use crate::{
    emitter::EventEmitter, error, observer::StreamObserver, resource::ResourceHandle,
    stream::Stream,
};

/// 聚合后的 worker 回调。
pub type Worker = Box<dyn FnMut()>;

/// 驱动已附着流的单线程 Reactor。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 在一个线程内复用一次零超时轮询处理全部连接，应用逻辑完全由观察者与 worker 表达；
/// - 通过 [`EventEmitter`] 契约与 [`Stream`] 解耦，流只知道“向某处注册资源”。
///
/// ## 逻辑 (How)
/// - `tick` 的步骤：运行 worker；注册表为空则运行 idle worker 并结束；否则轮询；
///   轮询无任何活动则结束；依次分发可读通知；可读集合为空时运行 idle worker；依次分发可写通知；
/// - 每一步都重新查询注册表，观察者在回调中附着或注销流不会使迭代失效；
/// - 回调期间不持有注册表借用；worker 与轮询器各自独立借用。
///
/// ## 契约 (What)
/// - `attach_stream` 先发出 `connected` 再登记；同一资源被另一条流重新登记时替换旧记录；
/// - `detach_stream` 只在资源确实登记于该流时生效：先发出 `disconnected` 再注销；
/// - 在 worker 或观察者内部重入 `tick` 会被忽略并记录告警。
pub struct Reactor {
    registry: RefCell<Vec<(ResourceHandle, Stream)>>,
    poller: RefCell<Box<dyn ReadinessPoller>>,
    worker: RefCell<Worker>,
    idle_worker: RefCell<Worker>,
    observer: Rc<dyn StreamObserver>,
    ticking: Cell<bool>,
}

impl Reactor {
    pub(crate) fn new(
        poller: Box<dyn ReadinessPoller>,
        worker: Worker,
        idle_worker: Worker,
        observer: Rc<dyn StreamObserver>,
    ) -> Self {
        Self {
            registry: RefCell::new(Vec::new()),
            poller: RefCell::new(poller),
            worker: RefCell::new(worker),
            idle_worker: RefCell::new(idle_worker),
            observer,
            ticking: Cell::new(false),
        }
    }

    /// 执行一轮调度。
    pub fn tick(&self) {
        let Some(_guard) = TickGuard::enter(&self.ticking) else {
            warn!("reentrant reactor tick ignored");
            return;
        };

        run_worker(&self.worker);

        let resources = self.resources();
        if resources.is_empty() {
            run_worker(&self.idle_worker);
            return;
        }

        let readiness = match self.poller.borrow_mut().poll(&resources) {
            Ok(readiness) => readiness,
            Err(err) => {
                warn!(
                    code = error::POLL.code,
                    error = %err,
                    "{} failed",
                    error::POLL.message
                );
                return;
            }
        };
        trace!(
            registered = resources.len(),
            readable = readiness.readable.len(),
            writable = readiness.writable.len(),
            "reactor poll completed"
        );
        if readiness.is_idle() {
            return;
        }

        for resource in &readiness.readable {
            if let Some(stream) = self.stream_for(*resource) {
                stream.notify_readable(&*self.observer);
            }
        }

        if readiness.readable.is_empty() {
            run_worker(&self.idle_worker);
        }

        for resource in &readiness.writable {
            if let Some(stream) = self.stream_for(*resource) {
                stream.notify_writable(&*self.observer);
            }
        }
    }

    /// 流是否以指定资源登记在此。
    pub fn has_stream_with_resource(&self, stream: &Stream, resource: ResourceHandle) -> bool {
        self.registry
            .borrow()
            .iter()
            .any(|(registered, owner)| *registered == resource && owner == stream)
    }

    pub fn has_stream(&self, stream: &Stream) -> bool {
        self.registry
            .borrow()
            .iter()
            .any(|(_, owner)| owner == stream)
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// 按注册顺序返回全部资源。
    pub fn resources(&self) -> Vec<ResourceHandle> {
        self.registry
            .borrow()
            .iter()
            .map(|(resource, _)| *resource)
            .collect()
    }

    fn stream_for(&self, resource: ResourceHandle) -> Option<Stream> {
        self.registry
            .borrow()
            .iter()
            .find(|(registered, _)| *registered == resource)
            .map(|(_, stream)| stream.clone())
    }
}

impl EventEmitter for Reactor {
    fn attach_stream(&self, stream: &Stream, resource: ResourceHandle) {
        self.observer.handle_connected(stream);

        let mut registry = self.registry.borrow_mut();
        match registry
            .iter_mut()
            .find(|(registered, _)| *registered == resource)
        {
            Some((_, owner)) => {
                if owner != stream {
                    warn!(
                        %resource,
                        previous = %owner.id(),
                        stream = %stream.id(),
                        "resource re-registered by a different stream"
                    );
                }
                *owner = stream.clone();
            }
            None => registry.push((resource, stream.clone())),
        }
        debug!(%resource, stream = %stream.id(), registered = registry.len(), "stream registered");
    }

    fn detach_stream(&self, stream: &Stream, resource: ResourceHandle) {
        if !self.has_stream_with_resource(stream, resource) {
            return;
        }
        stream.notify_disconnected(&*self.observer);

        let mut registry = self.registry.borrow_mut();
        registry.retain(|(registered, owner)| !(*registered == resource && owner == stream));
        debug!(%resource, stream = %stream.id(), registered = registry.len(), "stream unregistered");
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("registered", &self.registry.borrow().len())
            .field("ticking", &self.ticking.get())
            .finish()
    }
}

fn run_worker(worker: &RefCell<Worker>) {
    let mut worker = worker.borrow_mut();
    (**worker)();
}

/// 标记 tick 进行中，离开作用域（包括展开）时复位。
struct TickGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> TickGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
