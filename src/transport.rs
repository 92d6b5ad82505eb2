use async_trait::async_trait;
use std::io;

/// Byte stream collaborator owned by a connection.
///
/// The engine only ever drives the outbound direction through this trait.
/// Inbound bytes travel the other way: the application reads from its socket
/// however it likes and forwards every chunk to the connection's
/// `receive_data`. All methods take `&self` since implementations serialize
/// their own writes; the engine may call `send` from several threads and
/// `close` more than once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the byte stream, blocking the calling thread until the
    /// stream is ready or failed.
    fn connect(&self) -> io::Result<()>;

    /// Establishes the byte stream without tying up a thread.
    async fn connect_async(&self) -> io::Result<()>;

    /// Hands `bytes` to the peer and returns `bytes.len()`. Implementations
    /// must take the whole buffer or return an error; the engine never
    /// resumes a short write.
    fn send(&self, bytes: &[u8]) -> io::Result<usize>;

    /// Releases the byte stream. Never fails and may be called on a
    /// transport that is already closed.
    fn close(&self);
}
