//! Adaptive audio chunk buffer
//!
//! Telephony peers deliver audio in very small frames (typically 20ms).
//! Forwarding each frame to the speech-agent peer as its own message
//! maximizes per-message overhead and can desynchronize the agent's
//! turn-taking, so inbound PCM is batched into larger chunks bounded by a
//! maximum buffering delay.

use std::time::{Duration, Instant};

/// Accumulates PCM bytes until a target size or a maximum delay is reached.
#[derive(Debug)]
pub struct ChunkBuffer {
    data: Vec<u8>,
    target_size: usize,
    max_delay: Duration,
    last_flush: Instant,
}

impl ChunkBuffer {
    pub fn new(target_size: usize, max_delay: Duration) -> Self {
        Self {
            data: Vec::with_capacity(target_size * 2),
            target_size,
            max_delay,
            last_flush: Instant::now(),
        }
    }

    /// Append `chunk` and emit the accumulation when either threshold trips.
    ///
    /// Emits when the accumulated length reaches the target size, or when the
    /// max delay has elapsed since the last flush. The returned chunk is the
    /// entire accumulation; the buffer is empty afterwards.
    pub fn add(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.data.extend_from_slice(chunk);

        if self.data.len() >= self.target_size || self.last_flush.elapsed() >= self.max_delay {
            self.take()
        } else {
            None
        }
    }

    /// Force emission of whatever is accumulated.
    ///
    /// Used at session teardown so trailing audio is never dropped.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        self.take()
    }

    fn take(&mut self) -> Option<Vec<u8>> {
        self.last_flush = Instant::now();
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data))
    }

    /// Bytes currently accumulated.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_exactly_once_at_target_size() {
        let mut buffer = ChunkBuffer::new(10, Duration::from_secs(60));

        assert!(buffer.add(&[1; 4]).is_none());
        assert!(buffer.add(&[2; 4]).is_none());

        let chunk = buffer.add(&[3; 4]).expect("target size reached");
        assert_eq!(chunk.len(), 12);
        assert_eq!(&chunk[..4], &[1; 4]);
        assert_eq!(&chunk[8..], &[3; 4]);
        assert!(buffer.is_empty());

        // Accumulation restarts from zero after emission.
        assert!(buffer.add(&[4; 4]).is_none());
    }

    #[test]
    fn test_elapsed_delay_flushes_partial_accumulation() {
        let mut buffer = ChunkBuffer::new(1024, Duration::from_millis(0));

        // Max delay of zero: every add emits whatever has accumulated.
        let chunk = buffer.add(&[7; 8]).expect("delay elapsed");
        assert_eq!(chunk, vec![7; 8]);
    }

    #[test]
    fn test_flush_drains_remainder() {
        let mut buffer = ChunkBuffer::new(100, Duration::from_secs(60));
        buffer.add(&[9; 30]);

        let chunk = buffer.flush().expect("partial data present");
        assert_eq!(chunk.len(), 30);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn test_empty_buffer_flush_is_none() {
        let mut buffer = ChunkBuffer::new(100, Duration::from_secs(60));
        assert!(buffer.flush().is_none());
        assert_eq!(buffer.len(), 0);
    }
}
