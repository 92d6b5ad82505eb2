mod encode;
mod head;
mod stream;

pub use encode::*;
pub use head::*;
pub use stream::*;

use bytes::{Bytes, BytesMut};
use std::convert::TryFrom;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::FromRepr)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum FrameParseError {
    #[error("incomplete, need at least {0} bytes")]
    Incomplete(usize),
    #[error("one or more rsv bits set")]
    RsvBit,
    #[error("invalid opcode {0:#x}")]
    InvalidOpcode(u8),
    #[error("fragmented {0:?} frame")]
    FragmentedControlFrame(Opcode),
    #[error("control frame payload of {0} bytes exceeds 125")]
    ControlPayloadTooLong(u64),
    #[error("frame payload of {0} bytes exceeds the configured limit")]
    PayloadTooLarge(u64),
}

// Masks or unmasks payload bytes in place. `offset` is the position of
// `buffer` within the frame payload; adding any multiple of 4 to it leaves
// the result unchanged.
pub fn mask(key: [u8; 4], offset: usize, buffer: &mut [u8]) {
    if key != [0u8; 4] {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte ^= key[(offset + i) & 3];
        }
    }
}

/// A complete frame, payload unmasked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsFrame {
    pub opcode: Opcode,
    pub fin: bool,
    pub payload: Bytes,
}

impl WsFrame {
    /// Parses one complete frame from the start of `buffer`, returning it
    /// together with the number of bytes it occupied. Control frames must
    /// arrive whole: fragmented ones and payloads above 125 bytes are
    /// rejected here rather than at the head level.
    pub fn parse(buffer: &[u8]) -> Result<(WsFrame, usize), FrameParseError> {
        let head = FrameHead::parse(buffer)?;
        if head.opcode.is_control() {
            if !head.fin {
                return Err(FrameParseError::FragmentedControlFrame(head.opcode));
            }
            if head.payload_len > 125 {
                return Err(FrameParseError::ControlPayloadTooLong(head.payload_len));
            }
        }
        let head_len = head.len_bytes();
        let payload_len = usize::try_from(head.payload_len)
            .map_err(|_| FrameParseError::PayloadTooLarge(head.payload_len))?;
        let frame_len = head_len
            .checked_add(payload_len)
            .ok_or(FrameParseError::PayloadTooLarge(head.payload_len))?;
        if buffer.len() < frame_len {
            return Err(FrameParseError::Incomplete(frame_len));
        }
        let mut payload = BytesMut::from(&buffer[head_len..frame_len]);
        mask(head.mask, 0, &mut payload);
        let frame = WsFrame {
            opcode: head.opcode,
            fin: head.fin,
            payload: payload.freeze(),
        };
        Ok((frame, frame_len))
    }

    /// Writes head and masked payload into `buffer`, returning the total
    /// frame length. Panics if `buffer` is too small.
    pub fn encode(head: FrameHead, payload: &[u8], buffer: &mut [u8]) -> usize {
        assert_eq!(payload.len() as u64, head.payload_len);
        let head_len = head.encode(buffer);
        let frame_len = head_len + payload.len();
        buffer[head_len..frame_len].copy_from_slice(payload);
        mask(head.mask, 0, &mut buffer[head_len..frame_len]);
        frame_len
    }

    pub fn encode_vec(head: FrameHead, payload: &[u8]) -> Vec<u8> {
        let mut buffer = vec![0u8; head.len_bytes() + payload.len()];
        WsFrame::encode(head, payload, &mut buffer);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unmasks_payload() {
        let head = FrameHead {
            fin: true,
            opcode: Opcode::Text,
            masked: true,
            mask: [0xA1, 0xB2, 0xC3, 0xD4],
            payload_len: 5,
        };
        let encoded = WsFrame::encode_vec(head, b"hello");
        assert_ne!(&encoded[6..], b"hello");
        let (frame, consumed) = WsFrame::parse(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(frame.opcode, Opcode::Text);
        assert!(frame.fin);
        assert_eq!(&frame.payload[..], b"hello");
    }

    #[test]
    fn masked_frame_with_a_zero_key_parses_whole() {
        // MASK bit set with the all-zero key: the key bytes still occupy
        // four bytes of head.
        let input = [0x81, 0x82, 0, 0, 0, 0, b'h', b'i'];
        let (frame, consumed) = WsFrame::parse(&input).unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(&frame.payload[..], b"hi");
    }

    #[test]
    fn masking_is_an_involution() {
        let key = [0x37, 0xFA, 0x21, 0x3D];
        let mut data = b"some longer payload that spans the key".to_vec();
        let original = data.clone();
        mask(key, 0, &mut data);
        assert_ne!(data, original);
        mask(key, 0, &mut data);
        assert_eq!(data, original);
        let mut empty: [u8; 0] = [];
        mask(key, 0, &mut empty);
    }

    #[test]
    fn mask_offset_is_modulo_key_length() {
        let key = [1u8, 2, 3, 4];
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        mask(key, 3, &mut a);
        mask(key, 7, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn fragmented_control_frame_rejected() {
        // Ping and Close without FIN.
        let result = WsFrame::parse(&[0x09, 0x00]);
        assert!(matches!(
            result,
            Err(FrameParseError::FragmentedControlFrame(Opcode::Ping))
        ));
        let result = WsFrame::parse(&[0x08, 0x00]);
        assert!(matches!(
            result,
            Err(FrameParseError::FragmentedControlFrame(Opcode::Close))
        ));
    }

    #[test]
    fn oversized_control_payload_rejected() {
        // Close with a 16-bit length of 126.
        let result = WsFrame::parse(&[0x88, 0x7E, 0x00, 0x7E]);
        assert!(matches!(
            result,
            Err(FrameParseError::ControlPayloadTooLong(126))
        ));
    }

    #[test]
    fn incomplete_payload_reports_frame_length() {
        let head = FrameHead {
            fin: true,
            opcode: Opcode::Binary,
            masked: false,
            mask: [0u8; 4],
            payload_len: 4,
        };
        let encoded = WsFrame::encode_vec(head, &[1, 2, 3, 4]);
        let result = WsFrame::parse(&encoded[..encoded.len() - 1]);
        assert!(matches!(result, Err(FrameParseError::Incomplete(6))));
    }
}
