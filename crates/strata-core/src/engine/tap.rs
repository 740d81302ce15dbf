//! Observer boundary - non-blocking block tap for visualization
//!
//! The audio thread publishes each produced block into a lock-free SPSC
//! ring; if the ring cannot take a whole block (the observer fell behind),
//! the block is dropped. The reader drains whole blocks and keeps only the
//! most recent one, so observation never back-pressures the audio thread
//! and may legitimately skip blocks.

use crate::types::StereoSample;

/// Ring depth in blocks; enough slack for a slow observer without holding
/// stale audio for long
const TAP_DEPTH_BLOCKS: usize = 4;

/// Create a tap pair for blocks of `block_frames` frames
pub fn block_tap(block_frames: usize) -> (BlockTap, TapReader) {
    let (producer, consumer) = rtrb::RingBuffer::new(block_frames * TAP_DEPTH_BLOCKS);
    (
        BlockTap {
            producer,
            dropped: 0,
        },
        TapReader {
            consumer,
            block_frames,
            latest: Vec::with_capacity(block_frames),
        },
    )
}

/// Audio-thread side of the tap
pub struct BlockTap {
    producer: rtrb::Producer<StereoSample>,
    dropped: u64,
}

impl BlockTap {
    /// Publish a block, whole or not at all. Never blocks.
    pub fn publish(&mut self, block: &[StereoSample]) {
        if self.producer.slots() < block.len() {
            self.dropped += 1;
            return;
        }
        for sample in block {
            if self.producer.push(*sample).is_err() {
                break;
            }
        }
    }

    /// Blocks dropped because the observer had not consumed the ring
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped
    }
}

/// Observer side of the tap
pub struct TapReader {
    consumer: rtrb::Consumer<StereoSample>,
    block_frames: usize,
    latest: Vec<StereoSample>,
}

impl TapReader {
    /// The most recently published block, if any has arrived yet.
    ///
    /// Drains every complete block currently in the ring and returns the
    /// newest; earlier unread blocks are discarded.
    pub fn latest_block(&mut self) -> Option<&[StereoSample]> {
        while self.consumer.slots() >= self.block_frames {
            self.latest.clear();
            for _ in 0..self.block_frames {
                match self.consumer.pop() {
                    Ok(sample) => self.latest.push(sample),
                    Err(_) => break,
                }
            }
        }
        if self.latest.is_empty() {
            None
        } else {
            Some(&self.latest)
        }
    }
}
