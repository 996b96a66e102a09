// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{lock, ChannelId, FieldMode};
use std::{collections::VecDeque, fmt, sync::Mutex};
use unix_ts::Timestamp;

/// A consumer-owned destination for one frame.
///
/// The buffer moves into the queue on enqueue and comes back to the
/// consumer inside a [`Completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    index: u32,
    data: Vec<u8>,
    bytes_used: usize,
}

impl FrameBuffer {
    /// Zero-filled buffer of `capacity` bytes identified by `index`.
    pub fn new(index: u32, capacity: usize) -> Self {
        FrameBuffer::from_vec(index, vec![0u8; capacity])
    }

    /// Wrap existing storage. The whole length is available to the engine.
    pub fn from_vec(index: u32, data: Vec<u8>) -> Self {
        FrameBuffer {
            index,
            data,
            bytes_used: 0,
        }
    }

    /// Consumer-assigned identifier.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes of valid image data, set on completion.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn set_bytes_used(&mut self, bytes: usize) {
        self.bytes_used = bytes.min(self.data.len());
    }
}

/// Final state of a returned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Filled with a complete frame
    Done,
    /// Returned unfilled, for example on stream stop
    Error,
}

/// Why a queue was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    StreamStop,
    Close,
    Shutdown,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlushReason::StreamStop => "stream stop",
            FlushReason::Close => "close",
            FlushReason::Shutdown => "shutdown",
        })
    }
}

/// A buffer handed back to the consumer.
#[derive(Debug)]
pub struct Completion {
    pub channel: ChannelId,
    pub buffer: FrameBuffer,
    /// Per-stream frame counter starting at 0 on each start.
    pub sequence: u32,
    pub timestamp: Timestamp,
    /// Field content of the buffer.
    pub field: FieldMode,
    pub state: BufferState,
}

/// Receiver of completed and flushed buffers.
///
/// Called from interrupt context for completions and from the stopping
/// thread for flushes; implementations must not block.
pub trait CompletionSink: Send + Sync {
    fn buffer_done(&self, completion: Completion);
}

impl<F> CompletionSink for F
where
    F: Fn(Completion) + Send + Sync,
{
    fn buffer_done(&self, completion: Completion) {
        self(completion)
    }
}

/// Per-channel FIFO of buffers waiting for DMA.
///
/// The queue has its own lock so that enqueue on one channel never waits
/// on interrupt work for another.
#[derive(Debug, Default)]
pub struct FrameQueue {
    buffers: Mutex<VecDeque<FrameBuffer>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        FrameQueue::default()
    }

    pub fn push(&self, buffer: FrameBuffer) {
        lock(&self.buffers).push_back(buffer);
    }

    /// Run `f` on the head buffer without removing it.
    pub fn with_front<T>(&self, f: impl FnOnce(&mut FrameBuffer) -> T) -> Option<T> {
        lock(&self.buffers).front_mut().map(f)
    }

    /// Remove the head buffer.
    pub fn complete_front(&self) -> Option<FrameBuffer> {
        lock(&self.buffers).pop_front()
    }

    /// Remove every queued buffer, oldest first.
    pub fn flush(&self) -> Vec<FrameBuffer> {
        lock(&self.buffers).drain(..).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.buffers).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.buffers).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new();
        for i in 0..3 {
            queue.push(FrameBuffer::new(i, 16));
        }

        assert_eq!(queue.with_front(|b| b.index()), Some(0));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.complete_front().map(|b| b.index()), Some(0));
        let rest: Vec<u32> = queue.flush().iter().map(FrameBuffer::index).collect();
        assert_eq!(rest, vec![1, 2]);
        assert!(queue.is_empty());
        assert!(queue.complete_front().is_none());
        assert!(queue.with_front(|_| ()).is_none());
    }

    #[test]
    fn test_front_edit_is_kept() {
        let queue = FrameQueue::new();
        queue.push(FrameBuffer::new(7, 4));
        queue.with_front(|b| b.data_mut()[0] = 0xaa);

        let buf = queue.complete_front().unwrap();
        assert_eq!(buf.data(), &[0xaa, 0, 0, 0]);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(FrameQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        queue.push(FrameBuffer::new(t * 100 + i, 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut indices: Vec<u32> = queue.flush().iter().map(FrameBuffer::index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..400).collect::<Vec<_>>());
    }

    #[test]
    fn test_bytes_used_is_bounded() {
        let mut buf = FrameBuffer::from_vec(1, vec![0; 10]);
        buf.set_bytes_used(64);
        assert_eq!(buf.bytes_used(), 10);
        assert_eq!(buf.capacity(), 10);
        assert_eq!(buf.into_vec().len(), 10);
    }
}
