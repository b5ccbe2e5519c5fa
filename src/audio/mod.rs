//! Audio path: per-source ring buffers and the block-mixing clock master.

pub mod engine;
pub mod ring;

pub use engine::{
    AudioClockEngine, AudioSource, BlockSink, MixedAudioBlock, BLOCK_FRAMES, CHANNELS, SAMPLE_RATE,
};
pub use ring::SampleRingBuffer;
