use crate::frame::{FrameHead, Opcode, WsFrame};
use rand::prelude::*;

/// Builds outbound frames for one connection. A client encoder draws a fresh
/// masking key from its own rng for every frame; a server encoder sends
/// unmasked. Outbound messages are never fragmented, so FIN is always set.
#[derive(Clone, Debug)]
pub struct FrameEncoder<R: RngCore = StdRng> {
    mask_rng: Option<R>,
}

impl FrameEncoder<StdRng> {
    pub fn client() -> Self {
        Self {
            mask_rng: Some(StdRng::from_entropy()),
        }
    }

    pub fn server() -> Self {
        Self { mask_rng: None }
    }

    pub fn with_role(mask: bool) -> Self {
        match mask {
            true => Self::client(),
            false => Self::server(),
        }
    }
}

impl<R: RngCore> FrameEncoder<R> {
    pub fn encode_vec(&mut self, opcode: Opcode, payload: &[u8]) -> Vec<u8> {
        let head = FrameHead {
            fin: true,
            opcode,
            masked: self.mask_rng.is_some(),
            mask: self.next_mask(),
            payload_len: payload.len() as u64,
        };
        WsFrame::encode_vec(head, payload)
    }

    fn next_mask(&mut self) -> [u8; 4] {
        self.mask_rng
            .as_mut()
            .map_or([0u8, 0u8, 0u8, 0u8], |rng| rng.next_u32().to_ne_bytes())
    }
}
