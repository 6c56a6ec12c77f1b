use std::collections::VecDeque;

use bytes::{Buf, Bytes};

use crate::error::WriteLimitReached;

/// 有界的写队列：按写入顺序保存待发送的字节块，并跟踪队首块的部分写进度。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 作为背压原语：限制尚未送达远端的总字节数，超限写入立即同步失败；
/// - 支持操作系统的“部分写”：队首块可以被多次推进，直到完全送达才出队。
///
/// ## 逻辑 (How)
/// - `chunks` 以 `Bytes` 保存每次写入；队首块通过 [`Buf::advance`] 原地前移，
///   因而 [`WriteBuffer::current_value`] 在两次推进之间始终返回同一段后缀；
/// - `total_size` 始终等于所有块剩余长度之和。
///
/// ## 契约 (What)
/// - **不变式**：`total_size <= limit`；
/// - `append` 要么完整追加，要么返回错误且不修改任何状态；
/// - `flush_not_written_items` 取走全部未送达数据后缓冲为空，重复调用返回空列表。
#[derive(Debug)]
pub struct WriteBuffer {
    chunks: VecDeque<Bytes>,
    total_size: usize,
    limit: usize,
}

impl WriteBuffer {
    /// 创建上限为 `limit` 字节的写缓冲。
    pub fn new(limit: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_size: 0,
            limit,
        }
    }

    /// 追加一个字节块。空块被直接忽略。
    pub fn append(&mut self, chunk: Bytes) -> Result<(), WriteLimitReached> {
        let requested = chunk.len();
        if requested + self.total_size > self.limit {
            return Err(WriteLimitReached::BufferFull {
                requested,
                buffered: self.total_size,
                limit: self.limit,
            });
        }
        if requested == 0 {
            return Ok(());
        }
        self.total_size += requested;
        self.chunks.push_back(chunk);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// 尚未送达远端的字节总数。
    pub fn len(&self) -> usize {
        self.total_size
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 在不触发 [`WriteLimitReached`] 的前提下还能追加的字节数。
    pub fn remaining_capacity(&self) -> usize {
        self.limit - self.total_size
    }

    /// 队首块尚未送达的后缀；缓冲为空时返回空块。
    pub fn current_value(&self) -> Bytes {
        self.chunks.front().cloned().unwrap_or_default()
    }

    /// 记录远端已接收 `bytes` 字节，推进队首块游标。
    ///
    /// `bytes` 超过队首剩余长度时按剩余长度截断；队首被完全消费后出队。
    pub fn handle_written_bytes(&mut self, bytes: usize) {
        let Some(head) = self.chunks.front_mut() else {
            return;
        };
        let consumed = bytes.min(head.len());
        head.advance(consumed);
        self.total_size -= consumed;
        if head.is_empty() {
            self.chunks.pop_front();
        }
    }

    /// 取走所有未送达数据：队首的剩余后缀在前，其后是从未尝试发送的块。
    pub fn flush_not_written_items(&mut self) -> Vec<Bytes> {
        self.total_size = 0;
        self.chunks.drain(..).collect()
    }
}
