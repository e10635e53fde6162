//! Host-facing framebuffer and audio queues: bounded single-producer
//! single-consumer queues guarded by a mutex and condition variable.
//!
//! The producer is the scheduler's frame-end and audio-device tasks;
//! the consumer is the host loop polling for output to present. Both
//! queues drop data under overflow rather than blocking the producer,
//! since a stalled emulator core is worse than a dropped frame or a
//! repeated audio batch.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// One decoded color-buffer frame, ready for host presentation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// RGBA8 pixel data, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// Bounded queue of completed frames.
///
/// The producer (`Core::run_frame`) drops the newest frame when the
/// queue is already full rather than blocking; the consumer (the host's
/// presentation loop) pops whatever is available and tolerates an empty
/// queue (nothing new since the last poll).
pub struct FrameQueue {
    inner: Mutex<VecDeque<Frame>>,
    depth: usize,
}

impl FrameQueue {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(depth)), depth: depth.max(1) }
    }

    /// Pushes `frame`, dropping it silently if the queue is already at
    /// capacity (drop newest on the producer side).
    pub fn push(&self, frame: Frame) {
        let mut queue = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if queue.len() < self.depth {
            queue.push_back(frame);
        }
    }

    /// Pops the oldest unconsumed frame, if any.
    pub fn pop(&self) -> Option<Frame> {
        let mut queue = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        queue.pop_front()
    }
}

/// Bounded single-producer/single-consumer audio sample queue: the
/// producer drops the newest batch on overflow, and a blocking consumer
/// substitutes the last delivered batch on underrun rather than stalling
/// the host's audio callback.
pub struct AudioQueue {
    inner: Mutex<AudioState>,
    ready: Condvar,
    depth: usize,
}

struct AudioState {
    queue: VecDeque<Vec<i16>>,
    last: Vec<i16>,
}

impl AudioQueue {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            inner: Mutex::new(AudioState { queue: VecDeque::with_capacity(depth), last: Vec::new() }),
            ready: Condvar::new(),
            depth: depth.max(1),
        }
    }

    /// Pushes one sample batch, dropping it if the queue is already at
    /// capacity, and wakes a blocked consumer.
    pub fn push(&self, samples: Vec<i16>) {
        let mut state = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.queue.len() < self.depth {
            state.queue.push_back(samples);
            self.ready.notify_one();
        }
    }

    /// Blocks until a batch is available or `timeout` elapses, then pops
    /// it; on underrun (timeout with nothing queued) returns the last
    /// batch delivered instead of blocking indefinitely.
    #[must_use]
    pub fn pop_blocking(&self, timeout: std::time::Duration) -> Vec<i16> {
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (mut state, _timed_out) = self
            .ready
            .wait_timeout_while(guard, timeout, |state| state.queue.is_empty())
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match state.queue.pop_front() {
            Some(batch) => {
                state.last.clone_from(&batch);
                batch
            }
            None => state.last.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_queue_drops_newest_once_full() {
        let queue = FrameQueue::new(2);
        let frame = |n: u8| Frame { width: 1, height: 1, pixels: vec![n] };
        queue.push(frame(1));
        queue.push(frame(2));
        queue.push(frame(3)); // dropped: queue already at depth 2
        assert_eq!(queue.pop().unwrap().pixels, vec![1]);
        assert_eq!(queue.pop().unwrap().pixels, vec![2]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn audio_underrun_repeats_the_last_batch() {
        let queue = AudioQueue::new(4);
        queue.push(vec![1, 2, 3]);
        let first = queue.pop_blocking(std::time::Duration::from_millis(10));
        assert_eq!(first, vec![1, 2, 3]);
        let underrun = queue.pop_blocking(std::time::Duration::from_millis(10));
        assert_eq!(underrun, vec![1, 2, 3]);
    }
}
