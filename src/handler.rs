/// Application reaction points for inbound traffic.
///
/// Every method defaults to a no-op, so implementations only spell out the
/// events they care about. Callbacks run on the thread that called
/// `receive_data`, one at a time, in wire order. Calling send operations on
/// the connection from inside a callback is fine.
pub trait WsHandler: Send {
    /// A complete text message. Payloads that are not valid utf-8 arrive
    /// with U+FFFD substituted for the offending sequences.
    fn on_text(&mut self, _text: &str) {}

    /// A complete binary message.
    fn on_binary(&mut self, _payload: &[u8]) {}

    /// A ping arrived. The matching pong has already been queued by the
    /// engine; this is informational.
    fn on_ping(&mut self, _payload: &[u8]) {}

    fn on_pong(&mut self, _payload: &[u8]) {}

    /// The peer sent a Close frame, or the engine terminated the connection
    /// over a protocol violation. Closes initiated by the application are
    /// not reported back.
    fn on_close(&mut self, _code: u16, _reason: &str) {}
}
