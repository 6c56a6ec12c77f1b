//! 外部 tick 驱动器。
//!
//! Reactor 本身不拥有循环；它只把自己注册为驱动器的一个 tick 处理器。
//! [`SimpleLoopRunner`] 是最小实现：按注册顺序调用处理器，每轮之间固定暂停。

use std::{cell::Cell, fmt, rc::Rc, thread, time::Duration};

use tracing::debug;

use crate::config::RunnerConfig;

/// 能够挂接 tick 处理器的驱动器。
pub trait LoopRunner {
    fn attach_tick_handler(&mut self, handler: Box<dyn FnMut()>);
}

/// 停止 [`SimpleLoopRunner::run`] 的句柄，可在 tick 处理器内部使用。
#[derive(Clone, Debug, Default)]
pub struct LoopStopper {
    running: Rc<Cell<bool>>,
}

impl LoopStopper {
    /// 请求在当前这一轮结束后退出循环。
    pub fn stop(&self) {
        self.running.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

/// 同步循环驱动器。
#[derive(Default)]
pub struct SimpleLoopRunner {
    handlers: Vec<Box<dyn FnMut()>>,
    stopper: LoopStopper,
}

impl SimpleLoopRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_handle(&self) -> LoopStopper {
        self.stopper.clone()
    }

    /// 按注册顺序调用每个处理器一次。
    pub fn run_once(&mut self) {
        for handler in self.handlers.iter_mut() {
            handler();
        }
    }

    /// 循环执行 [`run_once`](Self::run_once)，每轮之后暂停 `pause`，直到被停止。
    ///
    /// 每次进入时重新置为运行状态，因此在上一次 `run` 之前调用的 `stop` 不会生效。
    pub fn run(&mut self, pause: Duration) {
        self.stopper.running.set(true);
        debug!(handlers = self.handlers.len(), ?pause, "loop runner started");
        let mut ticks = 0u64;
        while self.stopper.is_running() {
            self.run_once();
            ticks += 1;
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }
        debug!(ticks, "loop runner stopped");
    }

    /// 以配置中的暂停时长运行。
    pub fn run_with_config(&mut self, config: &RunnerConfig) {
        self.run(config.tick_pause());
    }
}

impl LoopRunner for SimpleLoopRunner {
    fn attach_tick_handler(&mut self, handler: Box<dyn FnMut()>) {
        self.handlers.push(handler);
    }
}

impl fmt::Debug for SimpleLoopRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleLoopRunner")
            .field("handlers", &self.handlers.len())
            .field("running", &self.stopper.is_running())
            .finish()
    }
}
