//! Error types used by the frame parser.

use core::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

use crate::error::TransportError;

/// Errors produced by [`FrameStream`](super::frame_stream::FrameStream).
#[derive(Debug, PartialEq)]
pub enum FrameStreamError<E> {
    /// Something went wrong with the underlying byte stream.
    Transport(E),
    /// The stream contained invalid UTF-8.
    Utf8Error(Utf8Error),
}

impl<E> From<Utf8Error> for FrameStreamError<E> {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl<E> Display for FrameStreamError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Utf8Error(e) => write!(f, "UTF-8 error: {e}"),
        }
    }
}

impl<E> core::error::Error for FrameStreamError<E> where E: core::error::Error {}

impl From<FrameStreamError<TransportError>> for TransportError {
    fn from(value: FrameStreamError<TransportError>) -> Self {
        match value {
            FrameStreamError::Transport(e) => e,
            FrameStreamError::Utf8Error(e) => TransportError::Utf8(e),
        }
    }
}
