//! Error types for the transport session library.

use crate::packet::PacketKind;

/// Errors that can occur in the transport session library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Buffer**: [`OutOfBounds`](Self::OutOfBounds): field access past the
///   valid length of a [`Buffer`](crate::Buffer).
/// - **Socket backend**: [`Io`](Self::Io), [`NoRemoteAddress`](Self::NoRemoteAddress),
///   [`PartialSend`](Self::PartialSend).
/// - **Session**: [`InterfaceNotSet`](Self::InterfaceNotSet).
/// - **Delivery loop**: [`AlreadyRunning`](Self::AlreadyRunning).
///
/// Conditions the in-memory interface tolerates silently (unknown socket
/// options, missing destination, out-of-range capture lookups) are not
/// errors and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixed-offset field does not fit inside the buffer.
    #[error("field at offset {offset} out of bounds for buffer of {len} bytes")]
    OutOfBounds { offset: usize, len: usize },

    /// The socket backend has no remote address for this packet class.
    #[error("no remote address configured for {0}")]
    NoRemoteAddress(PacketKind),

    /// The socket accepted fewer bytes than the datagram holds.
    #[error("partial send: {sent} of {expected} bytes")]
    PartialSend { sent: usize, expected: usize },

    /// [`TransportSession`](crate::TransportSession) has no network interface attached.
    #[error("network interface not set")]
    InterfaceNotSet,

    /// [`ExecutionContext::spawn`](crate::ExecutionContext::spawn) was called
    /// while a loop is already draining that context.
    #[error("delivery loop already running")]
    AlreadyRunning,
}

/// Convenience alias for `Result<T, TransportError>`.
pub type Result<T> = std::result::Result<T, TransportError>;
