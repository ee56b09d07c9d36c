//! Crate-wide error type and result alias.

use crate::win::WinId;

/// Errors surfaced by the core subsystems.
///
/// The variants follow the failure kinds laid out in the error handling
/// design: `Gone` and `MissingProperty`/`UnknownAtom` are expected, routine
/// outcomes that callers recover from locally; `Protocol` and `FatalIo`
/// originate from the installed X error handlers; everything else is a
/// local programming/data error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying connection to the X server is closed.
    #[error("the underlying connection to the X server is closed")]
    ConnectionClosed,

    /// An operation targeted a window that the server has already
    /// destroyed. Recovery: drop the local record and continue.
    #[error("window {0} is gone")]
    Gone(WinId),

    /// The server returned a protocol error (BadMatch, BadValue, ...).
    #[error("X protocol error: {0}")]
    Protocol(String),

    /// The connection to the X server was lost. No further server traffic
    /// may be attempted after this is observed.
    #[error("fatal I/O error on the X connection: {0}")]
    FatalIo(String),

    /// An allocation-returning request failed server-side (e.g. pixmap
    /// creation against an exhausted resource budget).
    #[error("the X server could not satisfy an allocation request")]
    OutOfMemory,

    /// Client data on a `ClientMessage` was malformed.
    #[error("invalid client message format: {0} (expected 8, 16 or 32)")]
    InvalidClientMessageData(u8),

    /// A `_MOTIF_WM_HINTS`-shaped property did not carry the minimum
    /// number of elements required to be meaningful.
    #[error("invalid window hints property: {0}")]
    InvalidHints(String),

    /// The requested property is not set for the given window.
    #[error("the {0} property is not set for window {1}")]
    MissingProperty(String, WinId),

    /// An attempt was made to reference an atom that is not known to this
    /// process's atom cache.
    #[error("{0} is not a known atom")]
    UnknownAtom(u32),

    /// An attempt was made to look up a window that has no registry entry.
    #[error("{0} is not a registered window")]
    UnknownWindow(WinId),

    /// Parsing an atom name from a string failed.
    #[error("{0}")]
    Strum(#[from] strum::ParseError),

    /// A generic error for constructing an [`Error`] from ad-hoc context.
    #[error("{0}")]
    Raw(String),

    /// A [`crate::xconn::mock::MockXConn`] method was called without a
    /// test override.
    #[error("this mock X connection method has not been implemented")]
    UnimplementedMock,

    /// An underlying x11rb connection or reply error.
    #[cfg(feature = "x11rb")]
    #[error("x11rb connection error: {0}")]
    X11rbConnection(#[from] x11rb::errors::ConnectionError),

    /// An underlying x11rb reply error (protocol error decoded by x11rb).
    #[cfg(feature = "x11rb")]
    #[error("x11rb reply error: {0}")]
    X11rbReply(#[from] x11rb::errors::ReplyError),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
