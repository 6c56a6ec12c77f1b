//! 配置加载：以 TOML 描述缓冲容量与循环节奏。
//!
//! # 教案式说明（Why）
//! - 缓冲容量直接决定背压阈值，部署时需要在不重新编译的情况下调整；
//! - 各段均有默认值，空文档即得到可运行的配置；未知字段直接拒绝，避免拼写错误被静默忽略。
//!
//! # 契约说明（What）
//! - [`ReactorConfig::from_toml_str`] 先解析再校验，所有容量必须大于 0；
//! - 各缓冲工厂通过 `from_config` 消费对应配置段。
//!
//! ```toml
//! [memory]
//! chunk_size = 4096
//!
//! [socket]
//! read_buffer_size = 65536
//! send_buffer_size = 8192
//!
//! [runner]
//! tick_pause_micros = 500
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const BUFFER_64KB: usize = 64 * 1024;
const BUFFER_512KB: usize = 512 * 1024;

/// 顶层配置。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReactorConfig {
    pub memory: MemoryBufferConfig,
    pub socket: SocketBufferConfig,
    pub runner: RunnerConfig,
}

/// 内存回环缓冲的容量配置。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryBufferConfig {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    /// 内存管道容量，即单次 `write_to_remote` 最多搬运的字节数。
    pub chunk_size: usize,
}

impl Default for MemoryBufferConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: BUFFER_64KB,
            write_buffer_size: BUFFER_64KB,
            chunk_size: BUFFER_64KB,
        }
    }
}

/// 套接字缓冲的容量配置。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SocketBufferConfig {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    /// 内核发送缓冲（`SO_SNDBUF`）；缺省时保持系统默认值。
    pub send_buffer_size: Option<usize>,
}

impl Default for SocketBufferConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: BUFFER_512KB,
            write_buffer_size: BUFFER_512KB,
            send_buffer_size: None,
        }
    }
}

/// 循环驱动器配置。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// 两次 tick 之间的暂停（微秒）。
    pub tick_pause_micros: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_pause_micros: 1_000,
        }
    }
}

impl RunnerConfig {
    pub fn tick_pause(&self) -> Duration {
        Duration::from_micros(self.tick_pause_micros)
    }
}

impl ReactorConfig {
    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("memory.read_buffer_size", Some(self.memory.read_buffer_size)),
            ("memory.write_buffer_size", Some(self.memory.write_buffer_size)),
            ("memory.chunk_size", Some(self.memory.chunk_size)),
            ("socket.read_buffer_size", Some(self.socket.read_buffer_size)),
            ("socket.write_buffer_size", Some(self.socket.write_buffer_size)),
            ("socket.send_buffer_size", self.socket.send_buffer_size),
        ];
        for (field, size) in sizes {
            if size == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }
        Ok(())
    }
}
