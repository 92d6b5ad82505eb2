use crate::frame::{FrameHead, FrameParseError, WsFrame};
use bytes::{Buf, BytesMut};

/// Incremental frame extraction from a pushed byte stream.
///
/// Bytes arrive in whatever chunks the transport produces; `push` appends
/// them and `next_frame` drains complete frames, leaving a trailing partial
/// frame buffered until more input arrives. The first invalid frame poisons
/// the decoder: the buffer is dropped and all further input is ignored, since
/// a stream without frame boundaries cannot be resynchronized.
#[derive(Debug)]
pub struct FrameStreamDecoder {
    buffer: BytesMut,
    max_payload_len: Option<usize>,
    failed: bool,
}

impl FrameStreamDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(None)
    }

    pub fn with_max_payload(max_payload_len: Option<usize>) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_payload_len,
            failed: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if !self.failed {
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Extracts the next complete frame. `Ok(None)` means the buffer holds at
    /// most a partial frame, or the decoder already failed.
    pub fn next_frame(&mut self) -> Result<Option<WsFrame>, FrameParseError> {
        if self.failed {
            return Ok(None);
        }
        // The payload cap is enforced from the head alone, before the
        // payload is buffered in full.
        match FrameHead::parse(&self.buffer) {
            Ok(head) => {
                if let Some(max) = self.max_payload_len {
                    if head.payload_len > max as u64 {
                        return Err(self.fail(FrameParseError::PayloadTooLarge(head.payload_len)));
                    }
                }
            }
            Err(FrameParseError::Incomplete(_)) => return Ok(None),
            Err(err) => return Err(self.fail(err)),
        }
        match WsFrame::parse(&self.buffer) {
            Ok((frame, frame_len)) => {
                self.buffer.advance(frame_len);
                Ok(Some(frame))
            }
            Err(FrameParseError::Incomplete(_)) => Ok(None),
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn fail(&mut self, err: FrameParseError) -> FrameParseError {
        self.failed = true;
        self.buffer = BytesMut::new();
        err
    }
}

impl Default for FrameStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
