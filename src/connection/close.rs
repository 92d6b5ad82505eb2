use crate::connection::text::text_lossy;

/// Close status codes defined by the protocol. The wire carries a bare u16;
/// these are the named assignments.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::FromRepr)]
#[repr(u16)]
pub enum CloseCode {
    NormalClosure = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    UnsupportedData = 1003,
    NoStatusReceived = 1005,
    AbnormalClosure = 1006,
    InvalidPayloadData = 1007,
    PolicyViolation = 1008,
    MessageTooBig = 1009,
    MandatoryExtension = 1010,
    InternalError = 1011,
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        code as u16
    }
}

/// Parsed payload of a Close frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: String,
}

impl WsCloseFrame {
    /// A payload of one byte or less carries no status; it reads as a normal
    /// closure with an empty reason. Reasons that are not valid utf-8 get
    /// U+FFFD substitutions.
    pub fn parse(payload: &[u8]) -> WsCloseFrame {
        if payload.len() <= 1 {
            return WsCloseFrame {
                code: CloseCode::NormalClosure.into(),
                reason: String::new(),
            };
        }
        WsCloseFrame {
            code: u16::from_be_bytes([payload[0], payload[1]]),
            reason: text_lossy(&payload[2..]).into_owned(),
        }
    }

    /// Builds the wire payload: big endian status code, then as much of the
    /// reason as fits a control frame without splitting a character.
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = self.code.to_be_bytes().to_vec();
        payload.extend_from_slice(truncate_reason(&self.reason, 123).as_bytes());
        payload
    }
}

// Control payloads top out at 125 bytes, two of which the code occupies.
fn truncate_reason(reason: &str, max: usize) -> &str {
    if reason.len() <= max {
        return reason;
    }
    let mut end = max;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// Which side ended the connection first. Transitions fire once; whatever
/// outcome lands first is kept and later attempts report `false`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum CloseState {
    Open,
    ClosedByUs,
    ClosedByPeer,
    Failed,
}

impl CloseState {
    pub(crate) fn is_open(self) -> bool {
        self == CloseState::Open
    }

    pub(crate) fn close_by_us(&mut self) -> bool {
        self.transition(CloseState::ClosedByUs)
    }

    pub(crate) fn close_by_peer(&mut self) -> bool {
        self.transition(CloseState::ClosedByPeer)
    }

    pub(crate) fn fail(&mut self) -> bool {
        self.transition(CloseState::Failed)
    }

    fn transition(&mut self, next: CloseState) -> bool {
        match self {
            CloseState::Open => {
                *self = next;
                true
            }
            _ => false,
        }
    }
}
