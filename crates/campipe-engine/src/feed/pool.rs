use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::error::{Error, Result};

use super::CameraBuffer;

/// Hands filled buffers from the producer to the pool's ready queue.
///
/// Cheap to clone and `Send`; producers call it from whatever thread their
/// completion callback runs on.
#[derive(Debug, Clone)]
pub struct FrameCallback {
    ready: Sender<CameraBuffer>,
}

impl FrameCallback {
    /// Moves a filled buffer onto the ready queue. Buffers delivered after
    /// the pool is gone are dropped.
    pub fn deliver(&self, buffer: CameraBuffer) {
        if self.ready.send(buffer).is_err() {
            log::debug!("frame delivered after the pool was released; dropping it");
        }
    }
}

/// Ready queue plus free list of a capture pipeline.
///
/// The ready queue is the only synchronisation point between the producer
/// and the render thread; the free list lives on the render thread and is
/// flushed back into the producer after each `queue`.
#[derive(Debug)]
pub struct BufferPool {
    ready_tx: Sender<CameraBuffer>,
    ready_rx: Receiver<CameraBuffer>,
    free: VecDeque<CameraBuffer>,
    total: usize,
}

impl BufferPool {
    /// Allocates `count` buffers of `width x height` onto the free list.
    pub fn new(count: usize, width: u32, height: u32) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel();
        let free = (0..count).map(|i| CameraBuffer::new(i, width, height)).collect();
        Self { ready_tx, ready_rx, free, total: count }
    }

    pub fn callback(&self) -> FrameCallback {
        FrameCallback { ready: self.ready_tx.clone() }
    }

    /// Oldest ready buffer, waiting at most `timeout`.
    pub fn dequeue(&self, timeout: Duration) -> Result<CameraBuffer> {
        match self.ready_rx.recv_timeout(timeout) {
            Ok(buf) => Ok(buf),
            // The pool keeps a sender alive, so disconnection cannot happen
            // while it exists; treat it like a stall anyway.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                Err(Error::DequeueTimeout { timeout_ms: timeout.as_millis() as u64 })
            }
        }
    }

    /// Returns a consumed buffer to the free list.
    pub fn release(&mut self, buffer: CameraBuffer) {
        self.free.push_back(buffer);
    }

    /// Takes the next free buffer, for handing to the producer.
    pub fn take_free(&mut self) -> Option<CameraBuffer> {
        self.free.pop_front()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Buffers allocated at creation.
    pub fn total(&self) -> usize {
        self.total
    }
}
