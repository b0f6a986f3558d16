//! Frame parser for line-oriented, blank-line-delimited event streams.
//!
//! Bytes arrive in arbitrary chunks; complete frames are produced as soon as
//! their terminating blank line has been seen, independent of where the chunk
//! boundaries fall. Only `event:` and `data:` fields are interpreted; comment
//! lines (`:` prefix) and any other field are skipped.

pub(crate) mod constants;
pub(crate) mod errors;
pub mod frame;
pub mod frame_stream;
pub(crate) mod parser;

pub use errors::FrameStreamError;
pub use frame::Frame;
pub use frame_stream::{FrameParser, FrameStream};
