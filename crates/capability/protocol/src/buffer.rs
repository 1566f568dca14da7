//! 有界流缓冲：生产侧永不阻塞，满时丢最旧并计数。
//!
//! 消费侧通过 `StreamHandle::next` 串行拉取，`stop` 之后生产侧的
//! `push` 返回 false，泵任务以此退出。任何一侧掉线都会唤醒另一侧。

use crate::types::Payload;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct Shared {
    capacity: usize,
    queue: Mutex<VecDeque<Payload>>,
    notify: Notify,
    overflow: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn pop(&self) -> Option<Payload> {
        match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// 生产端：协议泵任务持有。
pub struct StreamSender {
    shared: Arc<Shared>,
}

impl StreamSender {
    /// 入队一条消息。队列满时丢弃最旧一条并累加溢出计数。
    ///
    /// 返回 false 表示消费端已停止，泵任务应当退出。
    pub fn push(&self, payload: Payload) -> bool {
        if self.shared.closed.load(Ordering::SeqCst) {
            return false;
        }
        match self.shared.queue.lock() {
            Ok(mut queue) => {
                if queue.len() >= self.shared.capacity {
                    queue.pop_front();
                    self.shared.overflow.fetch_add(1, Ordering::Relaxed);
                }
                queue.push_back(payload);
            }
            Err(_) => return false,
        }
        self.shared.notify.notify_one();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for StreamSender {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// 消费端：会话循环持有，串行拉取。
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// 取下一条消息；流结束（生产端掉线且队列耗尽）返回 `None`。
    pub async fn next(&mut self) -> Option<Payload> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(payload) = self.shared.pop() {
                return Some(payload);
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    /// 停止消费。之后生产端 `push` 返回 false。
    pub fn stop(&self) {
        self.shared.close();
    }

    /// 因队列满而被丢弃的消息总数。
    pub fn overflow_count(&self) -> u64 {
        self.shared.overflow.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// 建一条容量为 `capacity` 的流通道。
pub fn stream_channel(capacity: usize) -> (StreamSender, StreamHandle) {
    let shared = Arc::new(Shared {
        capacity: capacity.max(1),
        queue: Mutex::new(VecDeque::new()),
        notify: Notify::new(),
        overflow: AtomicU64::new(0),
        closed: AtomicBool::new(false),
    });
    (
        StreamSender {
            shared: Arc::clone(&shared),
        },
        StreamHandle { shared },
    )
}
