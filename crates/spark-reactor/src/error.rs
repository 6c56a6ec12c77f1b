//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义 Reactor 与缓冲流对外暴露的错误语义：写入背压、配置解析与套接字初始化；
//! - 为套接字后端提供统一的 `io::Error` 分类，决定一次系统调用失败是“稍后重试”还是“连接已断开”。
//!
//! ## 设计要求（What）
//! - 所有公开错误类型派生 `thiserror::Error`，可直接参与 `?` 传播；
//! - `WriteLimitReached` 始终同步返回，且返回时缓冲区状态保持不变；
//! - 连接断开不是错误值：它被锁存在缓冲内部，最终以 `handle_disconnected` 通知呈现。

use std::{borrow::Cow, io};

use thiserror::Error;

/// 写入被拒绝：写缓冲已达上限，或连接已关闭/断开。
///
/// # 教案式说明
/// - **意图 (Why)**：背压信号。调用方应持有数据，在下一次可写通知时重试，或直接丢弃。
/// - **契约 (What)**：
///   - `BufferFull`：`requested + buffered > limit`，缓冲内容未被修改；
///   - `ConnectionUnavailable`：连接已关闭或被判定为断开，任何写入都会被拒绝。
/// - **风险 (Trade-offs)**：错误只携带长度信息，不回传数据本身；调用方需自行保留被拒绝的负载。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WriteLimitReached {
    /// 追加后将超出写缓冲上限。
    #[error(
        "write buffer limit reached: {requested} bytes requested with {buffered}/{limit} bytes queued"
    )]
    BufferFull {
        requested: usize,
        buffered: usize,
        limit: usize,
    },
    /// 连接已关闭或断开。
    #[error("connection is closed or broken: {requested} bytes rejected")]
    ConnectionUnavailable { requested: usize },
}

impl WriteLimitReached {
    /// 被拒绝的字节数。
    pub fn requested(&self) -> usize {
        match self {
            Self::BufferFull { requested, .. } | Self::ConnectionUnavailable { requested } => {
                *requested
            }
        }
    }
}

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 文本无法解析或包含未知字段。
    #[error("failed to parse reactor configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// 字段取值非法。
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

/// 描述一次底层操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy, Debug)]
pub(crate) struct OperationKind {
    pub code: &'static str,
    pub message: &'static str,
}

pub(crate) const CONFIGURE: OperationKind = OperationKind {
    code: "spark.reactor.socket.configure_failed",
    message: "socket configure",
};
pub(crate) const READ: OperationKind = OperationKind {
    code: "spark.reactor.socket.read_failed",
    message: "socket read",
};
pub(crate) const WRITE: OperationKind = OperationKind {
    code: "spark.reactor.socket.write_failed",
    message: "socket write",
};
pub(crate) const SHUTDOWN: OperationKind = OperationKind {
    code: "spark.reactor.socket.shutdown_failed",
    message: "socket shutdown",
};
pub(crate) const POLL: OperationKind = OperationKind {
    code: "spark.reactor.poll_failed",
    message: "readiness poll",
};

/// 套接字接入缓冲流时的初始化失败（设置非阻塞、调整缓冲等）。
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SocketSetupError {
    code: &'static str,
    message: Cow<'static, str>,
    #[source]
    source: io::Error,
}

impl SocketSetupError {
    /// 稳定错误码，例如 `spark.reactor.socket.configure_failed`。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 底层 IO 错误。
    pub fn io_error(&self) -> &io::Error {
        &self.source
    }
}

/// 将 IO 错误映射为带稳定错误码的初始化错误。
pub(crate) fn map_setup_error(kind: OperationKind, error: io::Error) -> SocketSetupError {
    SocketSetupError {
        code: kind.code,
        message: Cow::Owned(format!("{}: {}", kind.message, error)),
        source: error,
    }
}

/// 一次系统调用失败后的处置方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IoDisposition {
    /// 暂时不可用，下一次 tick 重新尝试。
    Transient,
    /// 对端已断开，连接需锁存为不可用。
    Broken,
    /// 其他错误：记录但不锁存。
    Other,
}

pub(crate) fn classify_io_error(error: &io::Error) -> IoDisposition {
    use io::ErrorKind;
    match error.kind() {
        ErrorKind::WouldBlock | ErrorKind::Interrupted => IoDisposition::Transient,
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected => IoDisposition::Broken,
        _ => IoDisposition::Other,
    }
}
