mod close;
mod config;
mod text;

pub use close::{CloseCode, WsCloseFrame};
pub use config::WsConfig;

use crate::connection::close::CloseState;
use crate::connection::text::text_lossy;
use crate::frame::{FrameEncoder, FrameParseError, FrameStreamDecoder, Opcode, WsFrame};
use crate::handler::WsHandler;
use crate::handshake::{HandshakePending, HandshakeState, WsHandshake, WsHandshakeError};
use crate::http::{
    encode_request_head, parse_response_head, upgrade_challenge_response, upgrade_request,
    ResponseHeadParseError,
};
use crate::transport::Transport;
use async_io::Timer;
use bytes::Bytes;
use futures::executor::block_on;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Waker;
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum WsConnectError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[from] WsHandshakeError),
    #[error("invalid upgrade request: {0}")]
    BadRequest(http::Error),
    #[error("request uri has no host: {0}")]
    BadUri(String),
    #[error("handshake was already started")]
    AlreadyStarted,
}

#[derive(thiserror::Error, Debug)]
pub enum WsSendError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("connection is not established")]
    NotConnected,
    #[error("connection is closed")]
    Closed,
}

#[derive(thiserror::Error, Debug)]
enum WsViolation {
    #[error("{0}")]
    Frame(#[from] FrameParseError),
    #[error("fragmented {0:?} message")]
    FragmentedMessage(Opcode),
}

impl WsViolation {
    fn close_code(&self) -> u16 {
        match self {
            WsViolation::Frame(FrameParseError::PayloadTooLarge(_)) => {
                CloseCode::MessageTooBig.into()
            }
            _ => CloseCode::ProtocolError.into(),
        }
    }
}

/// A websocket endpoint over a caller supplied [Transport].
///
/// The connection never reads by itself: the application forwards whatever
/// bytes its transport produces to [receive_data](Self::receive_data), and
/// decoded traffic comes back through the [WsHandler]. Clones share one
/// underlying connection and may live on different threads.
pub struct WsConnection<T: Transport> {
    transport: Arc<T>,
    handler: Arc<Mutex<Box<dyn WsHandler>>>,
    inner: Arc<Mutex<WsConnectionInner>>,
}

impl<T: Transport> Clone for WsConnection<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            handler: self.handler.clone(),
            inner: self.inner.clone(),
        }
    }
}

pub(crate) struct WsConnectionInner {
    pub(crate) config: WsConfig,
    pub(crate) handshake: HandshakeState,
    pub(crate) frames: FrameStreamDecoder,
    pub(crate) encoder: FrameEncoder,
    pub(crate) close_state: CloseState,
}

// Everything received is handled in two phases. Under the inner lock, bytes
// are routed and protocol state advances; handler callbacks and transport
// writes then run unlocked, so a callback may call back into send operations
// without deadlocking.
enum Action {
    Text(Bytes),
    Binary(Bytes),
    Ping { payload: Bytes, pong: Vec<u8> },
    Pong(Bytes),
    Close { close: WsCloseFrame, reply: Vec<u8> },
    Fail { code: u16, reason: String, frame: Vec<u8> },
    HandshakeResolved(Option<Waker>),
    HandshakeFailed(Option<Waker>),
}

impl<T: Transport> WsConnection<T> {
    /// Wraps a transport that still needs the upgrade handshake. Call
    /// [connect](Self::connect) or [connect_async](Self::connect_async) next.
    pub fn with_config(transport: T, handler: Box<dyn WsHandler>, config: WsConfig) -> Self {
        Self::new(transport, handler, config, HandshakeState::NotStarted)
    }

    /// Wraps a transport that already speaks frames, as on the server side
    /// after answering the upgrade request with [upgrade_response][resp].
    ///
    /// [resp]: crate::http::upgrade_response
    pub fn upgraded(transport: T, handler: Box<dyn WsHandler>, config: WsConfig) -> Self {
        Self::new(transport, handler, config, HandshakeState::Success)
    }

    fn new(
        transport: T,
        handler: Box<dyn WsHandler>,
        config: WsConfig,
        handshake: HandshakeState,
    ) -> Self {
        let inner = WsConnectionInner {
            frames: FrameStreamDecoder::with_max_payload(config.max_payload_len),
            encoder: FrameEncoder::with_role(config.mask),
            close_state: CloseState::Open,
            handshake,
            config,
        };
        Self {
            transport: Arc::new(transport),
            handler: Arc::new(Mutex::new(handler)),
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, WsConnectionInner> {
        self.inner.lock().unwrap()
    }

    /// Connects the transport and drives the upgrade handshake, blocking the
    /// calling thread until the handshake resolves or times out.
    pub fn connect(&self, uri: &str) -> Result<(), WsConnectError> {
        self.transport.connect()?;
        let handshake = self.start_handshake(uri)?;
        Ok(block_on(handshake)?)
    }

    /// Like [connect](Self::connect), without tying up a thread while the
    /// response is outstanding.
    pub async fn connect_async(&self, uri: &str) -> Result<(), WsConnectError> {
        self.transport.connect_async().await?;
        let handshake = self.start_handshake(uri)?;
        Ok(handshake.await?)
    }

    fn start_handshake(&self, uri: &str) -> Result<WsHandshake<'_, T>, WsConnectError> {
        let request = upgrade_request()
            .uri(uri)
            .body(())
            .map_err(WsConnectError::BadRequest)?;
        if request.uri().authority().is_none() {
            return Err(WsConnectError::BadUri(uri.to_string()));
        }
        let key = request
            .headers()
            .get("Sec-WebSocket-Key")
            .map(|key| key.as_bytes().to_vec())
            .unwrap_or_default();
        let expected_accept = upgrade_challenge_response(&key);
        let head = encode_request_head(&request);
        let deadline = {
            let mut inner = self.lock_inner();
            match inner.handshake {
                HandshakeState::NotStarted => {}
                _ => return Err(WsConnectError::AlreadyStarted),
            }
            let deadline = Instant::now() + inner.config.handshake_timeout;
            inner.handshake = HandshakeState::AwaitingResponse(Box::new(HandshakePending {
                deadline,
                expected_accept,
                buffer: Vec::new(),
                waker: None,
            }));
            deadline
        };
        log::debug!("handshake request for {}", uri);
        if let Err(err) = self.transport.send(&head) {
            self.lock_inner().handshake =
                HandshakeState::Failed(WsHandshakeError::TransportFailed);
            self.transport.close();
            return Err(err.into());
        }
        Ok(WsHandshake {
            conn: self,
            timer: Timer::at(deadline),
        })
    }

    /// Sends one text message as a single frame, returning the number of
    /// bytes handed to the transport.
    pub fn send_text(&self, text: &str) -> Result<usize, WsSendError> {
        self.send_frame(Opcode::Text, text.as_bytes())
    }

    /// Sends one binary message as a single frame.
    pub fn send_binary(&self, payload: &[u8]) -> Result<usize, WsSendError> {
        self.send_frame(Opcode::Binary, payload)
    }

    /// Sends a ping. The peer's pong arrives through
    /// [on_pong](crate::handler::WsHandler::on_pong).
    pub fn ping(&self, payload: &[u8]) -> Result<usize, WsSendError> {
        self.send_frame(Opcode::Ping, payload)
    }

    fn send_frame(&self, opcode: Opcode, payload: &[u8]) -> Result<usize, WsSendError> {
        let bytes = {
            let mut inner = self.lock_inner();
            match inner.handshake {
                HandshakeState::Success => {}
                _ => return Err(WsSendError::NotConnected),
            }
            if !inner.close_state.is_open() {
                return Err(WsSendError::Closed);
            }
            inner.encoder.encode_vec(opcode, payload)
        };
        Ok(self.transport.send(&bytes)?)
    }

    /// Sends a best effort Close frame and releases the transport. Repeated
    /// calls and calls on never connected or already closed connections just
    /// release the transport again.
    pub fn close(&self, code: impl Into<u16>, reason: &str) {
        let code = code.into();
        let frame = {
            let mut inner = self.lock_inner();
            let established = matches!(inner.handshake, HandshakeState::Success);
            match established && inner.close_state.close_by_us() {
                true => {
                    let payload = WsCloseFrame {
                        code,
                        reason: reason.to_string(),
                    }
                    .payload();
                    Some(inner.encoder.encode_vec(Opcode::Close, &payload))
                }
                false => None,
            }
        };
        if let Some(frame) = frame {
            log::debug!("closing with code {}", code);
            if let Err(err) = self.transport.send(&frame) {
                log::debug!("close frame send failed: {}", err);
            }
        }
        self.transport.close();
    }

    /// Receive notification. The application calls this with every chunk of
    /// bytes the transport delivers, in order; chunk boundaries are
    /// arbitrary. Handler callbacks run on the calling thread before this
    /// returns.
    pub fn receive_data(&self, bytes: &[u8]) {
        for action in self.route(bytes) {
            self.perform(action);
        }
    }

    // Phase one: advance protocol state under the inner lock and collect
    // what has to happen afterwards.
    fn route(&self, bytes: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut inner = self.lock_inner();
        if matches!(
            inner.handshake,
            HandshakeState::NotStarted | HandshakeState::Failed(_)
        ) {
            log::debug!("dropping {} bytes, no established connection", bytes.len());
            return actions;
        }
        if matches!(inner.handshake, HandshakeState::AwaitingResponse(_)) {
            route_response(&mut inner, bytes, &mut actions);
            if !matches!(inner.handshake, HandshakeState::Success) {
                return actions;
            }
        } else if !inner.close_state.is_open() {
            log::debug!(
                "dropping {} bytes, connection is {:?}",
                bytes.len(),
                inner.close_state
            );
            return actions;
        } else {
            inner.frames.push(bytes);
        }
        drain_frames(&mut inner, &mut actions);
        actions
    }

    // Phase two: handler callbacks and transport writes, unlocked.
    fn perform(&self, action: Action) {
        match action {
            Action::Text(payload) => {
                let text = text_lossy(&payload);
                self.handler.lock().unwrap().on_text(&text);
            }
            Action::Binary(payload) => self.handler.lock().unwrap().on_binary(&payload),
            Action::Ping { payload, pong } => {
                self.handler.lock().unwrap().on_ping(&payload);
                if let Err(err) = self.transport.send(&pong) {
                    log::debug!("pong send failed: {}", err);
                }
            }
            Action::Pong(payload) => self.handler.lock().unwrap().on_pong(&payload),
            Action::Close { close, reply } => {
                match CloseCode::from_repr(close.code) {
                    Some(code) => log::debug!("peer closed: {}", code),
                    None => log::debug!("peer closed with code {}", close.code),
                }
                self.handler.lock().unwrap().on_close(close.code, &close.reason);
                if let Err(err) = self.transport.send(&reply) {
                    log::debug!("close reply send failed: {}", err);
                }
                self.transport.close();
            }
            Action::Fail { code, reason, frame } => {
                self.handler.lock().unwrap().on_close(code, &reason);
                if let Err(err) = self.transport.send(&frame) {
                    log::debug!("close frame send failed: {}", err);
                }
                self.transport.close();
            }
            Action::HandshakeResolved(waker) => {
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            Action::HandshakeFailed(waker) => {
                self.transport.close();
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
        }
    }
}

fn route_response(inner: &mut WsConnectionInner, bytes: &[u8], actions: &mut Vec<Action>) {
    let (result, waker, tail) = {
        let pending = match &mut inner.handshake {
            HandshakeState::AwaitingResponse(pending) => pending.as_mut(),
            _ => return,
        };
        if Instant::now() >= pending.deadline {
            (Err(WsHandshakeError::Timeout), pending.waker.take(), Vec::new())
        } else {
            pending.buffer.extend_from_slice(bytes);
            match parse_response_head(&pending.buffer) {
                Err(ResponseHeadParseError::Incomplete) => return,
                Err(ResponseHeadParseError::Malformed(what)) => (
                    Err(WsHandshakeError::MalformedResponse(what.to_string())),
                    pending.waker.take(),
                    Vec::new(),
                ),
                Ok((response, consumed)) => match pending.validate(&response) {
                    Ok(()) => (
                        Ok(()),
                        pending.waker.take(),
                        pending.buffer.split_off(consumed),
                    ),
                    Err(err) => (Err(err), pending.waker.take(), Vec::new()),
                },
            }
        }
    };
    match result {
        Ok(()) => {
            log::debug!("handshake complete");
            inner.handshake = HandshakeState::Success;
            // Frame bytes may ride in on the same chunk as the response.
            inner.frames.push(&tail);
            actions.push(Action::HandshakeResolved(waker));
        }
        Err(err) => {
            log::warn!("handshake failed: {}", err);
            inner.handshake = HandshakeState::Failed(err);
            actions.push(Action::HandshakeFailed(waker));
        }
    }
}

fn drain_frames(inner: &mut WsConnectionInner, actions: &mut Vec<Action>) {
    while inner.close_state.is_open() {
        match inner.frames.next_frame() {
            Ok(Some(frame)) => classify_frame(inner, frame, actions),
            Ok(None) => break,
            Err(err) => {
                fail_connection(inner, WsViolation::Frame(err), actions);
                break;
            }
        }
    }
}

fn classify_frame(inner: &mut WsConnectionInner, frame: WsFrame, actions: &mut Vec<Action>) {
    match frame.opcode {
        Opcode::Ping => {
            let pong = inner.encoder.encode_vec(Opcode::Pong, &frame.payload);
            actions.push(Action::Ping {
                payload: frame.payload,
                pong,
            });
        }
        Opcode::Pong => actions.push(Action::Pong(frame.payload)),
        Opcode::Close => {
            let close = WsCloseFrame::parse(&frame.payload);
            inner.close_state.close_by_peer();
            // Acknowledge with the peer's code and no reason of our own.
            let reply = WsCloseFrame {
                code: close.code,
                reason: String::new(),
            }
            .payload();
            let reply = inner.encoder.encode_vec(Opcode::Close, &reply);
            actions.push(Action::Close { close, reply });
        }
        Opcode::Text if frame.fin => actions.push(Action::Text(frame.payload)),
        Opcode::Binary if frame.fin => actions.push(Action::Binary(frame.payload)),
        Opcode::Continuation | Opcode::Text | Opcode::Binary => {
            fail_connection(inner, WsViolation::FragmentedMessage(frame.opcode), actions);
        }
    }
}

fn fail_connection(inner: &mut WsConnectionInner, violation: WsViolation, actions: &mut Vec<Action>) {
    if inner.close_state.fail() {
        log::warn!("protocol violation: {}", violation);
        let code = violation.close_code();
        let payload = WsCloseFrame {
            code,
            reason: String::new(),
        }
        .payload();
        let frame = inner.encoder.encode_vec(Opcode::Close, &payload);
        actions.push(Action::Fail {
            code,
            reason: violation.to_string(),
            frame,
        });
    }
}
