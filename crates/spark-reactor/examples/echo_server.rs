//! 回显服务器示例。
//!
//! ```text
//! RUST_LOG=spark_reactor=debug cargo run -p spark-reactor --example echo_server -- 127.0.0.1:7000 [reactor.toml]
//! ```
//!
//! - 监听套接字在独立的 tick 处理器中以非阻塞方式接受连接，并把新流附着到 Reactor；
//! - 观察者把读到的数据原样写回；写缓冲已满时丢弃并记录告警；
//! - 对端半关闭后仍会收到最后一次回显，随后的空读触发 `close`；
//! - 可选的第二个参数指向 TOML 配置文件，用于调整缓冲容量与 tick 间隔。

use std::{env, error::Error, fs, io::ErrorKind, net::TcpListener, rc::Rc};

use bytes::Bytes;
use spark_reactor::{
    BufferedStreamFactory, LoopRunner, ReactorBuilder, ReactorConfig, SimpleLoopRunner,
    SocketStreamBufferFactory, Stream, StreamClient, StreamObserver,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Echo;

impl StreamObserver for Echo {
    fn handle_connected(&self, stream: &Stream) {
        info!(stream = %stream.id(), "client connected");
    }

    fn handle_readable(&self, stream: &Stream, client: &mut dyn StreamClient) {
        let data = client.read();
        if data.is_empty() {
            // 可读却没有数据：对端已结束发送。
            client.close();
            return;
        }
        if let Err(err) = client.write(data) {
            warn!(stream = %stream.id(), error = %err, "echo dropped");
        }
    }

    fn handle_disconnected(&self, stream: &Stream, unsent_data: &[Bytes]) {
        let unsent: usize = unsent_data.iter().map(|chunk| chunk.len()).sum();
        info!(stream = %stream.id(), unsent, "client disconnected");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:7000".to_owned());
    let config = match args.next() {
        Some(path) => ReactorConfig::from_toml_str(&fs::read_to_string(path)?)?,
        None => ReactorConfig::default(),
    };

    let listener = TcpListener::bind(&address)?;
    listener.set_nonblocking(true)?;
    info!(%address, "echo server listening");

    let mut runner = SimpleLoopRunner::new();
    let reactor = ReactorBuilder::new()
        .add_stream_observer(Rc::new(Echo))
        .build(&mut runner);

    let buffers = SocketStreamBufferFactory::from_config(&config.socket);
    let streams = BufferedStreamFactory;
    runner.attach_tick_handler(Box::new(move || {
        loop {
            match listener.accept() {
                Ok((socket, peer)) => match buffers.create_from_socket(socket) {
                    Ok(buffer) => {
                        info!(%peer, "accepted connection");
                        streams.create_from_buffer(buffer).attach(reactor.clone());
                    }
                    Err(err) => warn!(%peer, code = err.code(), error = %err, "socket setup failed"),
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    break;
                }
            }
        }
    }));

    runner.run_with_config(&config.runner);
    Ok(())
}
