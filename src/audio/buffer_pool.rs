// BufferPool - lock-free buffer pool with dual SPSC queues
//
// The device callback must not allocate or lock, so raw capture data travels
// to the detector worker in pre-allocated buffers circulating over two
// SPSC ring buffers:
// - data queue: capture callback pushes filled buffers, worker consumes
// - pool queue: worker returns drained buffers, capture callback recycles
//
// When the pool runs dry the callback drops that block of audio and counts
// it; the worker reports the count in its periodic statistics.

use rtrb::{Consumer, Producer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_BUFFER_COUNT: usize = 32;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Audio buffer type - pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// Queue ends owned by the device callback
pub struct CaptureChannels {
    pub data_producer: Producer<AudioBuffer>,
    pub pool_consumer: Consumer<AudioBuffer>,
    dropped_blocks: Arc<AtomicU64>,
}

impl CaptureChannels {
    /// Copy the first channel of an interleaved block into a pooled buffer
    ///
    /// Never allocates: samples beyond the buffer's capacity are truncated
    /// and a block arriving with no free buffer is dropped.
    pub fn push_interleaved(&mut self, data: &[f32], channels: usize) {
        self.push_converted(data, channels, |sample| sample);
    }

    /// Same as [`push_interleaved`](Self::push_interleaved) for non-f32 device formats
    pub fn push_converted<T: Copy>(
        &mut self,
        data: &[T],
        channels: usize,
        convert: impl Fn(T) -> f32,
    ) {
        let channels = channels.max(1);
        let Ok(mut buffer) = self.pool_consumer.pop() else {
            self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
            return;
        };

        buffer.clear();
        let room = buffer.capacity();
        buffer.extend(data.iter().step_by(channels).take(room).map(|&s| convert(s)));

        if let Err(rtrb::PushError::Full(_)) = self.data_producer.push(buffer) {
            self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Queue ends owned by the detector worker
pub struct WorkerChannels {
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
    dropped_blocks: Arc<AtomicU64>,
}

impl WorkerChannels {
    /// Drain every filled buffer, handing samples to `sink`
    ///
    /// Returns the number of buffers drained.
    pub fn drain<F: FnMut(&[f32])>(&mut self, mut sink: F) -> usize {
        let mut drained = 0;
        while let Ok(buffer) = self.data_consumer.pop() {
            sink(&buffer);
            drained += 1;
            // Pool queue has room for every buffer, so this cannot fail.
            let _ = self.pool_producer.push(buffer);
        }
        drained
    }

    /// Blocks dropped by the capture callback so far
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
pub struct BufferPool;

impl BufferPool {
    /// Pre-allocate `buffer_count` buffers of `buffer_size` samples
    ///
    /// # Panics
    /// Panics if buffer_count is 0 or buffer_size is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> (CaptureChannels, WorkerChannels) {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(buffer_size > 0, "buffer_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        // This is the only place where heap allocation occurs
        for _ in 0..buffer_count {
            let buffer = vec![0.0_f32; buffer_size];
            pool_producer
                .push(buffer)
                .expect("Failed to push buffer to pool queue during initialization");
        }

        let dropped_blocks = Arc::new(AtomicU64::new(0));

        (
            CaptureChannels {
                data_producer,
                pool_consumer,
                dropped_blocks: Arc::clone(&dropped_blocks),
            },
            WorkerChannels {
                data_consumer,
                pool_producer,
                dropped_blocks,
            },
        )
    }
}
