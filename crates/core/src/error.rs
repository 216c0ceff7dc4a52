//! Error types for the RTP streaming library.

/// Errors that can occur while sending or receiving RTP.
///
/// Most of these are survivable: the send and receive loops log them and
/// move on to the next tick or datagram. Only
/// [`TransportSetup`](Self::TransportSetup) and
/// [`InvalidFrameRate`](Self::InvalidFrameRate) stop a loop before it starts.
///
/// End of input from a [`ChunkSource`](crate::source::ChunkSource) is not an
/// error; it is reported as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// Underlying I/O error: a chunk read failure or a socket read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The datagram is too short to hold the 12-byte fixed RTP header.
    #[error("RTP header too short: {len} bytes, need 12")]
    MalformedHeader { len: usize },

    /// The packet carries a payload type the receiver has no path for.
    #[error("unknown payload type: {0}")]
    UnsupportedPayloadType(u8),

    /// Binding or resolving the UDP socket failed at startup.
    #[error("transport setup failed for {addr}: {source}")]
    TransportSetup {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The pacing rate must be a positive, finite number of packets per second.
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(f64),
}

/// Convenience alias for `Result<T, RtpError>`.
pub type Result<T> = std::result::Result<T, RtpError>;
