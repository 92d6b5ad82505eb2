use crate::connection::WsConnection;
use crate::transport::Transport;
use async_io::Timer;
use http::{Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::Instant;

#[derive(thiserror::Error, Debug, Clone)]
pub enum WsHandshakeError {
    #[error("handshake timed out")]
    Timeout,
    #[error("unexpected http status {0}")]
    BadStatus(u16),
    #[error("sec-websocket-accept mismatch")]
    AcceptMismatch,
    #[error("malformed http response: {0}")]
    MalformedResponse(String),
    #[error("transport failed during handshake")]
    TransportFailed,
}

/// Handshake progress of one connection. The slot moves forward only:
/// once `Success` or `Failed` is reached it never changes again.
pub(crate) enum HandshakeState {
    NotStarted,
    AwaitingResponse(Box<HandshakePending>),
    Success,
    Failed(WsHandshakeError),
}

pub(crate) struct HandshakePending {
    pub(crate) deadline: Instant,
    pub(crate) expected_accept: String,
    pub(crate) buffer: Vec<u8>,
    pub(crate) waker: Option<Waker>,
}

impl HandshakePending {
    // Acceptance is status plus challenge response. Connection and Upgrade
    // echoes carry no information the 101 status does not already imply.
    pub(crate) fn validate(&self, response: &Response<()>) -> Result<(), WsHandshakeError> {
        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(WsHandshakeError::BadStatus(response.status().as_u16()));
        }
        let accept = response
            .headers()
            .get("Sec-WebSocket-Accept")
            .ok_or_else(|| {
                WsHandshakeError::MalformedResponse("missing Sec-WebSocket-Accept".to_string())
            })?;
        match accept.as_bytes() == self.expected_accept.as_bytes() {
            true => Ok(()),
            false => Err(WsHandshakeError::AcceptMismatch),
        }
    }
}

/// Resolves when the pending handshake succeeds, fails, or passes its
/// deadline. Dropping the future leaves the handshake pending; response
/// bytes arriving later still resolve the state.
pub struct WsHandshake<'a, T: Transport> {
    pub(crate) conn: &'a WsConnection<T>,
    pub(crate) timer: Timer,
}

impl<'a, T: Transport> Future for WsHandshake<'a, T> {
    type Output = Result<(), WsHandshakeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut inner = this.conn.lock_inner();
        match &mut inner.handshake {
            HandshakeState::Success => Poll::Ready(Ok(())),
            HandshakeState::Failed(err) => Poll::Ready(Err(err.clone())),
            HandshakeState::AwaitingResponse(pending) => {
                if Pin::new(&mut this.timer).poll(cx).is_ready() {
                    inner.handshake = HandshakeState::Failed(WsHandshakeError::Timeout);
                    drop(inner);
                    log::warn!("handshake timed out");
                    this.conn.transport().close();
                    return Poll::Ready(Err(WsHandshakeError::Timeout));
                }
                pending.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            HandshakeState::NotStarted => unreachable!(),
        }
    }
}
