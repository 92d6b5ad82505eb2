#![allow(dead_code)]

use async_trait::async_trait;
use push_ws::connection::{WsConfig, WsConnection};
use push_ws::frame::{FrameEncoder, FrameHead, FrameStreamDecoder, Opcode, WsFrame};
use push_ws::handler::WsHandler;
use push_ws::http::upgrade_challenge_response;
use push_ws::transport::Transport;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// In memory stand-in for a socket. Outbound bytes pile up in `sent`;
/// inbound bytes are pushed by the test through `receive_data` directly.
pub struct MockTransport {
    sent: Mutex<Vec<u8>>,
    closed: AtomicBool,
    connect_error: Mutex<Option<io::Error>>,
    send_error: Mutex<Option<io::ErrorKind>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            connect_error: Mutex::new(None),
            send_error: Mutex::new(None),
        }
    }

    pub fn failing_connect(kind: io::ErrorKind) -> Self {
        let transport = Self::new();
        *transport.connect_error.lock().unwrap() = Some(kind.into());
        transport
    }

    /// Makes every send from now on fail with `kind`.
    pub fn fail_sends(&self, kind: io::ErrorKind) {
        *self.send_error.lock().unwrap() = Some(kind);
    }

    pub fn sent(&self) -> Vec<u8> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Decodes everything sent so far as a frame sequence.
    pub fn sent_frames(&self) -> Vec<WsFrame> {
        let mut decoder = FrameStreamDecoder::new();
        decoder.push(&self.sent());
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn connect(&self) -> io::Result<()> {
        match self.connect_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn connect_async(&self) -> io::Result<()> {
        self.connect()
    }

    fn send(&self, bytes: &[u8]) -> io::Result<usize> {
        if let Some(kind) = *self.send_error.lock().unwrap() {
            return Err(kind.into());
        }
        self.sent.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close { code: u16, reason: String },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub struct RecordingHandler {
    events: EventLog,
}

impl WsHandler for RecordingHandler {
    fn on_text(&mut self, text: &str) {
        self.events.lock().unwrap().push(Event::Text(text.to_string()));
    }
    fn on_binary(&mut self, payload: &[u8]) {
        self.events.lock().unwrap().push(Event::Binary(payload.to_vec()));
    }
    fn on_ping(&mut self, payload: &[u8]) {
        self.events.lock().unwrap().push(Event::Ping(payload.to_vec()));
    }
    fn on_pong(&mut self, payload: &[u8]) {
        self.events.lock().unwrap().push(Event::Pong(payload.to_vec()));
    }
    fn on_close(&mut self, code: u16, reason: &str) {
        self.events.lock().unwrap().push(Event::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

pub fn recording_handler() -> (Box<RecordingHandler>, EventLog) {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let handler = Box::new(RecordingHandler {
        events: events.clone(),
    });
    (handler, events)
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

pub fn server_endpoint() -> (WsConnection<MockTransport>, EventLog) {
    server_endpoint_with(WsConfig::server())
}

pub fn server_endpoint_with(config: WsConfig) -> (WsConnection<MockTransport>, EventLog) {
    let (handler, log) = recording_handler();
    let conn = WsConnection::upgraded(MockTransport::new(), handler, config);
    (conn, log)
}

pub fn client_endpoint() -> (WsConnection<MockTransport>, EventLog) {
    let (handler, log) = recording_handler();
    let conn = WsConnection::upgraded(MockTransport::new(), handler, WsConfig::client());
    (conn, log)
}

pub fn unestablished_client(config: WsConfig) -> (WsConnection<MockTransport>, EventLog) {
    let (handler, log) = recording_handler();
    let conn = WsConnection::with_config(MockTransport::new(), handler, config);
    (conn, log)
}

/// A frame as the peer's client side would put it on the wire, masked with
/// a fresh key.
pub fn masked_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    FrameEncoder::client().encode_vec(opcode, payload)
}

/// An arbitrary frame, for shapes the encoder refuses to produce. A zero
/// `mask` builds an unmasked frame.
pub fn raw_frame(opcode: Opcode, fin: bool, mask: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let head = FrameHead {
        fin,
        opcode,
        masked: mask != [0u8; 4],
        mask,
        payload_len: payload.len() as u64,
    };
    WsFrame::encode_vec(head, payload)
}

/// Builds the 101 response matching the key in a captured upgrade request.
pub fn accept_response(sent_request: &[u8]) -> Vec<u8> {
    let head = std::str::from_utf8(sent_request).unwrap();
    let key = head
        .lines()
        .find_map(|line| line.strip_prefix("sec-websocket-key: "))
        .expect("no key in request")
        .trim();
    let accept = upgrade_challenge_response(key.as_bytes());
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        accept
    )
    .into_bytes()
}

pub fn poll_once<F: Future>(future: Pin<&mut F>) -> Poll<F::Output> {
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    future.poll(&mut cx)
}

pub fn init_logging() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init()
        .ok();
}
