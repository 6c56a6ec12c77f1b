use std::rc::Rc;

use super::{Reactor, ReadinessPoller, SystemPoller, Worker};
use crate::{
    observer::{CompositeStreamObserver, StreamObserver},
    runner::LoopRunner,
};

/// 组装 [`Reactor`] 的构建器。
///
/// # 契约 (What)
/// - 多个 worker / idle worker 按添加顺序聚合为一个回调，每次调用依次全部执行；
/// - 多个观察者聚合为 [`CompositeStreamObserver`]，通知按添加顺序扇出；
/// - 未指定轮询器时使用 [`SystemPoller`]；
/// - [`build`](Self::build) 会把 Reactor 注册为驱动器的一个 tick 处理器。
pub struct ReactorBuilder {
    workers: Vec<Worker>,
    idle_workers: Vec<Worker>,
    observers: CompositeStreamObserver,
    poller: Option<Box<dyn ReadinessPoller>>,
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactorBuilder {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            idle_workers: Vec::new(),
            observers: CompositeStreamObserver::new(),
            poller: None,
        }
    }

    pub fn add_stream_observer(mut self, observer: Rc<dyn StreamObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 每个 tick 开始时运行。
    pub fn add_worker(mut self, worker: impl FnMut() + 'static) -> Self {
        self.workers.push(Box::new(worker));
        self
    }

    /// 注册表为空或本轮没有可读资源时运行。
    pub fn add_idle_worker(mut self, worker: impl FnMut() + 'static) -> Self {
        self.idle_workers.push(Box::new(worker));
        self
    }

    pub fn with_poller(mut self, poller: Box<dyn ReadinessPoller>) -> Self {
        self.poller = Some(poller);
        self
    }

    /// 构建 Reactor 并注册到 `runner`。
    pub fn build(self, runner: &mut impl LoopRunner) -> Rc<Reactor> {
        let reactor = Rc::new(self.build_standalone());
        let handler = reactor.clone();
        runner.attach_tick_handler(Box::new(move || handler.tick()));
        reactor
    }

    /// 构建不挂接任何驱动器的 Reactor，由调用方自行调用 [`Reactor::tick`]。
    pub fn build_standalone(self) -> Reactor {
        let poller = self
            .poller
            .unwrap_or_else(|| Box::new(SystemPoller::new()));
        Reactor::new(
            poller,
            aggregate(self.workers),
            aggregate(self.idle_workers),
            Rc::new(self.observers),
        )
    }
}

fn aggregate(mut workers: Vec<Worker>) -> Worker {
    Box::new(move || {
        for worker in workers.iter_mut() {
            worker();
        }
    })
}
