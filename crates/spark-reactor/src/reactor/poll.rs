use std::io;

use nix::{errno::Errno, libc};
use tracing::trace;

use crate::resource::ResourceHandle;

/// 一次轮询的结果：可读集合与可写集合，均保持传入资源的顺序。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: Vec<ResourceHandle>,
    pub writable: Vec<ResourceHandle>,
}

impl Readiness {
    /// 可读、可写集合均为空。
    pub fn is_idle(&self) -> bool {
        self.readable.is_empty() && self.writable.is_empty()
    }
}

/// 就绪轮询的接缝。
///
/// # 契约 (What)
/// - 零超时、电平触发：只要条件仍成立，每次轮询都会再次报告；
/// - 返回集合中的资源必须来自 `resources`，且保持其相对顺序；
/// - 失败以 `io::Error` 返回，由 Reactor 记录后视为本轮无活动。
pub trait ReadinessPoller {
    fn poll(&mut self, resources: &[ResourceHandle]) -> io::Result<Readiness>;
}

/// 基于 `poll(2)` 的轮询器。
///
/// `POLLIN`、`POLLHUP`、`POLLERR` 计入可读（由读路径发现 EOF 或错误），`POLLOUT` 计入可写；
/// `POLLNVAL` 表示描述符已失效，直接忽略。
#[derive(Default)]
pub struct SystemPoller {
    fds: Vec<libc::pollfd>,
}

impl std::fmt::Debug for SystemPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPoller")
            .field("capacity", &self.fds.capacity())
            .finish()
    }
}

impl SystemPoller {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadinessPoller for SystemPoller {
    fn poll(&mut self, resources: &[ResourceHandle]) -> io::Result<Readiness> {
        if resources.is_empty() {
            return Ok(Readiness::default());
        }
        self.fds.clear();
        self.fds.extend(resources.iter().map(|resource| libc::pollfd {
            fd: resource.as_raw(),
            events: libc::POLLIN | libc::POLLOUT,
            revents: 0,
        }));

        loop {
            match poll_now(&mut self.fds) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(io::Error::from(errno)),
            }
        }

        let mut readiness = Readiness::default();
        for (resource, entry) in resources.iter().zip(&self.fds) {
            let revents = entry.revents;
            if revents & libc::POLLNVAL != 0 {
                trace!(%resource, "poll reported an invalid descriptor");
                continue;
            }
            if revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                readiness.readable.push(*resource);
            }
            if revents & libc::POLLOUT != 0 {
                readiness.writable.push(*resource);
            }
        }
        Ok(readiness)
    }
}

#[allow(unsafe_code)]
fn poll_now(fds: &mut [libc::pollfd]) -> Result<usize, Errno> {
    // SAFETY: `fds` 是独占借用的连续 `pollfd` 数组，长度与传入的 `nfds` 一致，
    // 且零超时调用不会在返回后继续访问该内存。
    let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, 0) };
    if ready < 0 {
        return Err(Errno::last());
    }
    Ok(ready as usize)
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        net::{TcpListener, TcpStream},
    };

    use super::*;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let client = TcpStream::connect(listener.local_addr().unwrap()).expect("connect");
        let (server, _) = listener.accept().expect("accept");
        (client, server)
    }

    #[test]
    fn empty_resource_set_is_idle() {
        let readiness = SystemPoller::new().poll(&[]).unwrap();
        assert!(readiness.is_idle());
    }

    #[test]
    fn reports_fresh_connection_as_writable_only() {
        let (client, _server) = connected_pair();
        let handle = ResourceHandle::of(&client);
        let readiness = SystemPoller::new().poll(&[handle]).unwrap();
        assert!(readiness.readable.is_empty());
        assert_eq!(readiness.writable, vec![handle]);
    }

    #[test]
    fn reports_pending_data_as_readable_until_consumed() {
        let (client, mut server) = connected_pair();
        server.write_all(b"ping").unwrap();
        let handle = ResourceHandle::of(&client);
        let mut poller = SystemPoller::new();

        let mut readable = false;
        for _ in 0..100 {
            if !poller.poll(&[handle]).unwrap().readable.is_empty() {
                readable = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(readable, "对端写入后应报告可读");
        assert_eq!(
            poller.poll(&[handle]).unwrap().readable,
            vec![handle],
            "电平触发：未消费的数据在下一次轮询中仍然可读"
        );
    }
}
