#![doc = r#"
# spark-reactor

## 设计动机（Why）
- **定位**：单线程、电平触发的非阻塞套接字 Reactor，配合带背压的缓冲流，
  以观察者回调的形式交付连接生命周期通知（connected / readable / writable / disconnected）。
- **架构角色**：位于原始字节层，不涉及协议分帧与加密；上层协议通过
  [`StreamObserver`] 读取入站字节、写入出站字节。
- **设计理念**：所有状态都在调用线程上同步推进，唯一的等待点是零超时轮询；
  断开检测采用“拉取式”，每次读写通知后检查一次，检测到断开即自动注销并回交未送达数据。

## 核心契约（What）
- [`WriteBuffer`]：有上限的写队列，超限写入被原子拒绝，支持部分写游标；
- [`StreamBuffer`]：缓冲流状态机，提供内存回环与真实套接字两种后端；
- [`Stream`]：把缓冲耦合到一个或多个 Reactor，负责通知分发与断开后的注销；
- [`Reactor`]：每次 `tick` 运行 worker、轮询就绪、先分发全部可读再分发全部可写，
  并且仅在本轮没有可读资源时运行 idle worker；
- [`CompositeStreamObserver`]：按顺序把每个通知转发给全部子观察者。

## 实现策略（How）
- 共享状态使用 `Rc` + `RefCell`，全部类型均为 `!Send`；
- 就绪轮询通过 [`ReadinessPoller`] 抽象，默认的 [`SystemPoller`] 直接调用 `poll(2)`；
- 套接字错误按 `io::ErrorKind` 分类，断开类错误被锁存为连接不可用；
  对端 EOF 只关闭读方向，写方向保持可用直到发送失败或本端 `close`；
- 日志统一使用 `tracing`，库本身不安装订阅者。

## 风险与考量（Trade-offs）
- **平台**：仅支持 Unix；资源句柄即原始文件描述符；
- **公平性**：单个流在一次可读通知中最多读取 `read_buffer_size` 字节，
  观察者若不消费读累加器，该流会持续被报告为可读。
"#]
#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
mod emitter;
pub mod error;
mod observer;
pub mod reactor;
mod resource;
pub mod runner;
mod stream;
pub mod test_stubs;
mod write_buffer;

pub use buffer::{
    InMemoryStreamBuffer, InMemoryStreamBufferFactory, SocketStreamBuffer,
    SocketStreamBufferFactory, StreamBuffer, StreamClient,
};
pub use config::{MemoryBufferConfig, ReactorConfig, RunnerConfig, SocketBufferConfig};
pub use emitter::EventEmitter;
pub use error::{ConfigError, SocketSetupError, WriteLimitReached};
pub use observer::{CompositeStreamObserver, StreamObserver};
pub use reactor::{Reactor, ReactorBuilder, Readiness, ReadinessPoller, SystemPoller};
pub use resource::ResourceHandle;
pub use runner::{LoopRunner, LoopStopper, SimpleLoopRunner};
pub use stream::{BufferedStreamFactory, Stream, StreamId, StreamState};
pub use write_buffer::WriteBuffer;
