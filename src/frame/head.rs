use crate::frame::{FrameParseError, Opcode};

#[derive(Copy, Clone, Debug)]
pub struct FrameHead {
    pub fin: bool,
    pub opcode: Opcode,
    /// Mask flag as on the wire. A masked frame may carry the all-zero key,
    /// so key presence is never inferred from `mask`.
    pub masked: bool,
    pub mask: [u8; 4],
    pub payload_len: u64,
}

impl FrameHead {
    /// Parses a frame head from the start of `buffer` without consuming
    /// anything. `Incomplete(n)` reports the minimum buffer length needed to
    /// make progress; the caller retries once more bytes arrived.
    pub fn parse(buffer: &[u8]) -> Result<FrameHead, FrameParseError> {
        if buffer.len() < 2 {
            return Err(FrameParseError::Incomplete(2));
        }
        if buffer[0] & 0x70 != 0 {
            return Err(FrameParseError::RsvBit);
        }
        let fin = buffer[0] & 0x80 != 0;
        let opcode = Opcode::from_repr(buffer[0] & 0x0F)
            .ok_or(FrameParseError::InvalidOpcode(buffer[0] & 0x0F))?;
        let masked = buffer[1] & 0x80 != 0;
        let extra_len_bytes = match buffer[1] & 0x7F {
            0..=125 => 0usize,
            126 => 2usize,
            _ => 8usize,
        };
        let head_len = 2 + extra_len_bytes + (masked as usize) * 4;
        if buffer.len() < head_len {
            return Err(FrameParseError::Incomplete(head_len));
        }
        let payload_len = match extra_len_bytes {
            0 => u64::from(buffer[1] & 0x7F),
            2 => u64::from(u16::from_be_bytes([buffer[2], buffer[3]])),
            _ => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&buffer[2..10]);
                u64::from_be_bytes(bytes)
            }
        };
        let mut mask = [0u8; 4];
        if masked {
            mask.copy_from_slice(&buffer[2 + extra_len_bytes..head_len]);
        }
        Ok(FrameHead {
            fin,
            opcode,
            masked,
            mask,
            payload_len,
        })
    }

    // Length of the encoded frame head in bytes ([2..14]).
    pub fn len_bytes(&self) -> usize {
        let extra_len_bytes = match self.payload_len {
            0..=125 => 0usize,
            126..=65535 => 2usize,
            _ => 8usize,
        };
        2 + extra_len_bytes + self.masked as usize * 4
    }

    // Writes the frame head to `buffer` and returns the number of bytes
    // written. Panics if `buffer` is shorter than `len_bytes()`.
    pub fn encode(&self, buffer: &mut [u8]) -> usize {
        buffer[0] = (self.fin as u8) << 7 | self.opcode as u8;
        let mask_bit = (self.masked as u8) << 7;
        let extra_len_bytes = match self.payload_len {
            0..=125 => {
                buffer[1] = mask_bit | self.payload_len as u8;
                0
            }
            126..=65535 => {
                buffer[1] = mask_bit | 126;
                buffer[2..4].copy_from_slice(&(self.payload_len as u16).to_be_bytes());
                2
            }
            _ => {
                buffer[1] = mask_bit | 127;
                buffer[2..10].copy_from_slice(&self.payload_len.to_be_bytes());
                8
            }
        };
        let mut written = 2 + extra_len_bytes;
        if self.masked {
            buffer[written..written + 4].copy_from_slice(&self.mask);
            written += 4;
        }
        written
    }
}
