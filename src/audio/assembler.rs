// Frame assembly for streamed PCM payloads
//
// Pulled message payloads arrive in arbitrary sizes. The assembler copies
// them into one fixed-capacity frame buffer; a frame is only ever handed
// to the decoder once it is completely filled.

use serde::{Deserialize, Serialize};
use std::mem;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Result of appending a payload to the frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Buffer still has room
    Partial,
    /// Buffer filled exactly to capacity; take the frame before appending again
    Complete,
}

/// What to do with a payload that runs past the end of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Fill the current frame and carry the tail into the next one
    #[default]
    Split,
    /// Treat the overflow as a fatal framing error
    Reject,
}

/// Accumulates raw payload bytes into fixed-size frames
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    capacity: usize,
    frames_completed: u64,
}

impl FrameAssembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            frames_completed: 0,
        }
    }

    /// Append a payload at the current write offset.
    ///
    /// Fails with a framing error if the payload would overflow the buffer,
    /// or if the previous frame was completed and not yet taken. Nothing is
    /// written on failure.
    pub fn append(&mut self, payload: &[u8]) -> PipelineResult<FrameStatus> {
        if self.is_complete() || payload.len() > self.remaining() {
            return Err(PipelineError::Framing {
                filled: self.filled(),
                capacity: self.capacity,
                incoming: payload.len(),
            });
        }

        self.buffer.extend_from_slice(payload);

        if self.is_complete() {
            Ok(FrameStatus::Complete)
        } else {
            Ok(FrameStatus::Partial)
        }
    }

    /// Take the completed frame and reset to an empty buffer in one step.
    ///
    /// Returns `None` while the frame is still partial.
    pub fn take_frame(&mut self) -> Option<Vec<u8>> {
        if !self.is_complete() {
            return None;
        }

        let frame = mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
        self.frames_completed += 1;
        debug!(
            "Frame {} assembled ({} bytes)",
            self.frames_completed,
            frame.len()
        );
        Some(frame)
    }

    /// Feed a payload under the given overflow policy, returning every frame
    /// it completed, in order.
    pub fn push(&mut self, payload: &[u8], policy: OverflowPolicy) -> PipelineResult<Vec<Vec<u8>>> {
        let mut frames = Vec::new();

        match policy {
            OverflowPolicy::Reject => {
                if self.append(payload)? == FrameStatus::Complete {
                    frames.extend(self.take_frame());
                }
            }
            OverflowPolicy::Split => {
                let mut rest = payload;
                while !rest.is_empty() {
                    let take = rest.len().min(self.remaining());
                    let (head, tail) = rest.split_at(take);
                    if self.append(head)? == FrameStatus::Complete {
                        frames.extend(self.take_frame());
                    }
                    rest = tail;
                }
            }
        }

        Ok(frames)
    }

    /// Drop whatever has been buffered so far
    pub fn discard(&mut self) {
        if !self.buffer.is_empty() {
            debug!("Discarding partial frame ({} bytes)", self.buffer.len());
        }
        self.buffer.clear();
    }

    pub fn filled(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn is_complete(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Number of frames handed out so far
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }
}
