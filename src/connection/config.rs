use std::time::Duration;

pub struct WsConfig {
    /// Mask outbound frames. On for the client role, off for the server
    /// role; the two sides of a connection must not agree.
    pub mask: bool,
    /// How long `connect` waits for the handshake response.
    pub handshake_timeout: Duration,
    /// Per-frame payload cap. Frames announcing more than this many payload
    /// bytes terminate the connection before the payload is buffered.
    pub max_payload_len: Option<usize>,
    _private: (),
}

impl WsConfig {
    pub fn client() -> Self {
        Self {
            mask: true,
            handshake_timeout: Duration::from_secs(2),
            max_payload_len: None,
            _private: (),
        }
    }
    pub fn server() -> Self {
        Self {
            mask: false,
            handshake_timeout: Duration::from_secs(2),
            max_payload_len: None,
            _private: (),
        }
    }
}
