pub mod assembler;
pub mod clocked;
pub mod decoder;
pub mod output;

#[cfg(feature = "cpal-output")]
pub mod cpal_output;
#[cfg(any(feature = "cpal-output", test))]
mod render;

pub use assembler::{FrameAssembler, FrameStatus, OverflowPolicy};
pub use clocked::{ClockedOutput, ClockedOutputFactory};
pub use decoder::{decode_pcm16le, DecodedFrame, PCM16_FULL_SCALE};
pub use output::{AudioOutput, FrameEnd, OutputBackend, OutputBackendFactory, OutputFactory};
