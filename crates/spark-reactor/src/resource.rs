use std::{
    fmt,
    os::fd::{AsRawFd, RawFd},
};

/// Reactor 注册表使用的不透明资源句柄。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - Reactor 只需要“可比较、可哈希、可轮询”的令牌来索引流，不关心底层是 TCP、Unix
///   套接字还是测试中随意指定的自定义值；
/// - 以新类型包裹原始描述符，避免在公开 API 中暴露平台类型。
///
/// ## 契约 (What)
/// - 相等性即描述符相等；
/// - 轮询器以 [`ResourceHandle::as_raw`] 取回描述符；若句柄并非有效描述符（例如内存
///   后端的自定义资源），`poll(2)` 报告 `POLLNVAL`，Reactor 将其视为无事件。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(RawFd);

impl ResourceHandle {
    /// 以原始描述符构造句柄；也用于测试中的自定义令牌。
    pub const fn from_raw(fd: RawFd) -> Self {
        Self(fd)
    }

    /// 取得任意持有描述符对象的句柄。
    pub fn of(source: &impl AsRawFd) -> Self {
        Self(source.as_raw_fd())
    }

    pub const fn as_raw(self) -> RawFd {
        self.0
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceHandle(fd={})", self.0)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}
