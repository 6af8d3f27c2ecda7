/// The already-secured channel the handshake runs over. The implementation is
/// expected to provide a reliable, ordered, confidentiality-protected byte
/// stream; the record layer is not this crate's concern.
///
/// Reads block until the requested amount arrives. There is no cancellation
/// support here: a caller that wants to abort closes the channel, which
/// surfaces as a failure on the next call.
pub trait SecureTransport {
    /// Establishes the transport-level security session.
    fn connect(&mut self) -> crate::Result<()>;

    /// Writes the whole buffer to the peer.
    fn send(&mut self, data: &[u8]) -> crate::Result<()>;

    /// Reads exactly `length` bytes from the peer.
    fn recv(&mut self, length: usize) -> crate::Result<Vec<u8>>;

    /// Returns the public key the peer presented during the transport
    /// security handshake. The negotiation binds to this key to rule out an
    /// interception relay.
    fn peer_public_key(&mut self) -> crate::Result<Vec<u8>>;
}
