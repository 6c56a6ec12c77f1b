//! 集成测试共享工具：回环套接字对、脚本化轮询器与等待辅助。
#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::VecDeque,
    io,
    net::{TcpListener, TcpStream},
    rc::Rc,
    thread,
    time::{Duration, Instant},
};

use spark_reactor::{Readiness, ReadinessPoller, ResourceHandle, SystemPoller};

/// 建立一条回环 TCP 连接，返回 `(本端, 远端)`。
pub fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let local = TcpStream::connect(listener.local_addr().expect("listener address"))
        .expect("connect loopback");
    let (remote, _) = listener.accept().expect("accept loopback");
    (local, remote)
}

/// 反复检查条件直至成立或超时，返回最终结果。
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// 等待 `socket` 在 `poll(2)` 中报告可读。
pub fn wait_readable(socket: &TcpStream) {
    let handle = ResourceHandle::of(socket);
    let mut poller = SystemPoller::new();
    assert!(
        wait_until(|| {
            poller
                .poll(&[handle])
                .map(|readiness| readiness.readable.contains(&handle))
                .unwrap_or(false)
        }),
        "socket never became readable"
    );
}

pub type Script = Rc<RefCell<VecDeque<io::Result<Readiness>>>>;

/// 按脚本返回就绪集合的轮询器，同时记录每次被轮询的资源列表。
pub struct ScriptedPoller {
    script: Script,
    polled: Rc<RefCell<Vec<Vec<ResourceHandle>>>>,
}

impl ScriptedPoller {
    pub fn new() -> (Self, Script, Rc<RefCell<Vec<Vec<ResourceHandle>>>>) {
        let script: Script = Rc::default();
        let polled = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                script: script.clone(),
                polled: polled.clone(),
            },
            script,
            polled,
        )
    }
}

impl ReadinessPoller for ScriptedPoller {
    fn poll(&mut self, resources: &[ResourceHandle]) -> io::Result<Readiness> {
        self.polled.borrow_mut().push(resources.to_vec());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Readiness::default()))
    }
}

pub fn readiness(readable: &[ResourceHandle], writable: &[ResourceHandle]) -> io::Result<Readiness> {
    Ok(Readiness {
        readable: readable.to_vec(),
        writable: writable.to_vec(),
    })
}

/// 按顺序记录名字的调用日志。
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<&'static str>>>);

impl CallLog {
    pub fn recorder(&self, name: &'static str) -> impl FnMut() + 'static {
        let calls = self.0.clone();
        move || calls.borrow_mut().push(name)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.borrow().clone()
    }
}
