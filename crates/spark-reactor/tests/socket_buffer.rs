//! 套接字后端契约：以真实回环连接验证读写、背压与断开锁存。

mod support;

use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
    thread,
    time::Duration,
};

use bytes::Bytes;
use socket2::SockRef;
use spark_reactor::{
    SocketBufferConfig, SocketStreamBuffer, SocketStreamBufferFactory, StreamBuffer, StreamClient,
    WriteLimitReached,
};
use support::{socket_pair, wait_readable, wait_until};

fn buffer_with(factory: SocketStreamBufferFactory) -> (SocketStreamBuffer, TcpStream) {
    let (local, remote) = socket_pair();
    remote
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("remote read timeout");
    let buffer = factory.create_from_socket(local).expect("socket setup");
    (buffer, remote)
}

fn read_remote(remote: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut received = vec![0; len];
    remote.read_exact(&mut received).expect("remote read");
    received
}

fn unsent(buffer: &mut SocketStreamBuffer) -> Option<Vec<Bytes>> {
    let mut reported = None;
    buffer.notify_connection_closed_or_broken(&mut |data| reported = Some(data));
    reported
}

#[test]
fn writes_to_remote_only_when_asked() {
    let (mut buffer, mut remote) = buffer_with(SocketStreamBufferFactory::new());
    buffer.write(Bytes::from_static(b"Hello World")).unwrap();

    remote.set_nonblocking(true).unwrap();
    let mut probe = [0u8; 16];
    assert_eq!(
        remote.read(&mut probe).unwrap_err().kind(),
        io::ErrorKind::WouldBlock,
        "写入远端之前对端不应收到任何数据"
    );
    remote.set_nonblocking(false).unwrap();

    buffer.write_to_remote();

    assert_eq!(read_remote(&mut remote, 11), b"Hello World");
    assert!(!buffer.is_remote_full());
}

#[test]
fn reads_from_remote_only_when_asked() {
    let (mut buffer, mut remote) = buffer_with(SocketStreamBufferFactory::new());
    remote.write_all(b"Some data").unwrap();
    wait_readable(buffer.socket());

    assert!(buffer.read().is_empty());
    buffer.read_from_remote();
    assert_eq!(buffer.read(), "Some data");
    assert!(buffer.read().is_empty(), "读取后读累加器应被清空");
}

#[test]
fn combines_multiple_remote_reads_into_single_value() {
    let (mut buffer, mut remote) = buffer_with(SocketStreamBufferFactory::new());
    remote.write_all(b"First data|").unwrap();
    wait_readable(buffer.socket());
    buffer.read_from_remote();
    remote.write_all(b"Second data|").unwrap();
    wait_readable(buffer.socket());
    buffer.read_from_remote();

    assert_eq!(buffer.read(), "First data|Second data|");
}

#[test]
fn stops_reading_once_read_buffer_is_filled() {
    let (mut buffer, mut remote) =
        buffer_with(SocketStreamBufferFactory::new().with_read_buffer(12));
    remote.write_all(b"Data#1Data#2Data#3Data#4").unwrap();
    wait_readable(buffer.socket());

    buffer.read_from_remote();
    buffer.read_from_remote();
    assert_eq!(buffer.read(), "Data#1Data#2");

    buffer.read_from_remote();
    assert_eq!(buffer.read(), "Data#3Data#4");
}

#[test]
fn rejects_writes_over_write_buffer_limit() {
    let (mut buffer, _remote) =
        buffer_with(SocketStreamBufferFactory::new().with_write_buffer(12));
    buffer.write(Bytes::from_static(b"Data#1")).unwrap();
    buffer.write(Bytes::from_static(b"Data#2")).unwrap();

    assert_eq!(
        buffer.write(Bytes::from_static(b"Data#3")),
        Err(WriteLimitReached::BufferFull {
            requested: 6,
            buffered: 12,
            limit: 12,
        })
    );
}

#[test]
fn flushes_complete_queue_in_single_call_and_frees_capacity() {
    let (mut buffer, mut remote) =
        buffer_with(SocketStreamBufferFactory::new().with_write_buffer(14));
    buffer.write(Bytes::from_static(b"Data#1")).unwrap();
    buffer.write(Bytes::from_static(b"Data#2")).unwrap();
    buffer.write_to_remote();
    buffer.write(Bytes::from_static(b"Data#3")).unwrap();
    buffer.write_to_remote();

    assert_eq!(read_remote(&mut remote, 18), b"Data#1Data#2Data#3");
}

#[test]
fn reports_remote_full_until_peer_drains() {
    const TOTAL: usize = 8 * 1024 * 1024;
    let (mut buffer, mut remote) = buffer_with(
        SocketStreamBufferFactory::new()
            .with_write_buffer(TOTAL)
            .with_send_buffer(4096),
    );
    let payload = Bytes::from(vec![b'a'; TOTAL]);
    buffer.write(payload).unwrap();

    buffer.write_to_remote();
    assert!(buffer.is_remote_full(), "内核缓冲无法一次容纳全部数据");
    assert!(!buffer.is_broken());

    let reader = thread::spawn(move || {
        let mut received = Vec::with_capacity(TOTAL);
        let mut chunk = vec![0u8; 64 * 1024];
        while received.len() < TOTAL {
            let read = remote.read(&mut chunk).expect("remote read");
            if read == 0 {
                break;
            }
            received.extend_from_slice(&chunk[..read]);
        }
        received
    });

    assert!(
        wait_until(|| {
            buffer.write_to_remote();
            !buffer.is_remote_full()
        }),
        "对端读空后应恢复可写"
    );
    let received = reader.join().expect("reader thread");
    assert_eq!(received.len(), TOTAL);
    assert!(received.iter().all(|byte| *byte == b'a'));
}

#[test]
fn half_closed_peer_still_receives_reply() {
    let (mut buffer, mut remote) = buffer_with(SocketStreamBufferFactory::new());
    remote.write_all(b"ping").unwrap();
    remote.shutdown(Shutdown::Write).expect("half close remote");
    wait_readable(buffer.socket());

    buffer.read_from_remote();
    assert_eq!(buffer.read(), "ping");
    assert!(buffer.is_read_closed());
    assert!(!buffer.is_broken());

    buffer
        .write(Bytes::from_static(b"pong"))
        .expect("write side stays open after remote EOF");
    buffer.write_to_remote();

    assert_eq!(read_remote(&mut remote, 4), b"pong");
    assert_eq!(unsent(&mut buffer), None, "EOF 本身不构成断开");
}

#[test]
fn stops_reading_after_remote_eof() {
    let (mut buffer, remote) = buffer_with(SocketStreamBufferFactory::new());
    remote.shutdown(Shutdown::Write).expect("half close remote");
    wait_readable(buffer.socket());

    buffer.read_from_remote();
    buffer.read_from_remote();

    assert!(buffer.is_read_closed());
    assert!(buffer.read().is_empty());
    assert!(!buffer.is_remote_full());
}

#[test]
fn remote_close_is_latched_once_a_send_fails() {
    let (mut buffer, remote) = buffer_with(SocketStreamBufferFactory::new());
    drop(remote);
    wait_readable(buffer.socket());
    buffer.read_from_remote();
    assert!(!buffer.is_broken(), "仅读到 EOF 时连接仍可写");

    assert!(
        wait_until(|| {
            let _ = buffer.write(Bytes::from_static(b"Data"));
            buffer.write_to_remote();
            buffer.is_broken()
        }),
        "向已关闭的对端发送最终应失败"
    );

    assert!(matches!(
        buffer.last_error_kind(),
        Some(io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset)
    ));
    assert!(buffer.is_remote_full());
    assert_eq!(
        buffer.write(Bytes::from_static(b"late")),
        Err(WriteLimitReached::ConnectionUnavailable { requested: 4 })
    );
    assert!(unsent(&mut buffer).is_some());
    assert_eq!(unsent(&mut buffer), None, "断开只报告一次");
}

#[test]
fn connection_reset_is_latched_with_unsent_data() {
    let (mut buffer, remote) = buffer_with(SocketStreamBufferFactory::new());
    buffer.write(Bytes::from_static(b"Data #1")).unwrap();
    buffer.write(Bytes::from_static(b"Data #2")).unwrap();
    SockRef::from(&remote)
        .set_linger(Some(Duration::ZERO))
        .expect("linger");
    drop(remote);
    wait_readable(buffer.socket());

    buffer.read_from_remote();

    assert!(buffer.is_broken());
    assert_eq!(buffer.last_error_kind(), Some(io::ErrorKind::ConnectionReset));
    assert_eq!(
        unsent(&mut buffer),
        Some(vec![
            Bytes::from_static(b"Data #1"),
            Bytes::from_static(b"Data #2"),
        ])
    );
}

#[test]
fn close_keeps_pending_writes_for_disconnect() {
    let (mut buffer, _remote) = buffer_with(SocketStreamBufferFactory::new());
    buffer.write(Bytes::from_static(b"flushed")).unwrap();
    buffer.write_to_remote();
    buffer.write(Bytes::from_static(b"Data #1")).unwrap();
    buffer.write(Bytes::from_static(b"Data #2")).unwrap();

    assert_eq!(unsent(&mut buffer), None);
    buffer.close();
    buffer.close();

    assert!(buffer.is_remote_full());
    assert_eq!(
        unsent(&mut buffer),
        Some(vec![
            Bytes::from_static(b"Data #1"),
            Bytes::from_static(b"Data #2"),
        ])
    );
}

#[test]
fn factory_reads_capacities_from_config() {
    let config = SocketBufferConfig {
        read_buffer_size: 4,
        write_buffer_size: 6,
        send_buffer_size: None,
    };
    let (mut buffer, mut remote) = buffer_with(SocketStreamBufferFactory::from_config(&config));
    assert!(buffer.write(Bytes::from_static(b"1234567")).is_err());

    remote.write_all(b"abcdef").unwrap();
    wait_readable(buffer.socket());
    buffer.read_from_remote();
    assert_eq!(buffer.read(), "abcd");
}

#[test]
fn default_factory_uses_default_config_section() {
    assert_eq!(
        SocketStreamBufferFactory::default(),
        SocketStreamBufferFactory::from_config(&SocketBufferConfig::default())
    );
}
