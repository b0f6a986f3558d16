//! [`Stream`] that converts a stream of byte chunks into [`Frame`]s.

use core::{
    pin::Pin,
    str::Utf8Error,
    task::{Context, Poll, ready},
};

use bytes::{Buf, BufMut, BytesMut};
use futures_core::Stream;

use super::{
    constants::{BOM, CR, LF},
    errors::FrameStreamError,
    frame::Frame,
    parser::{FieldName, Line, parse_line_from_buffer},
};

// ---------------------------------------------------------------------------
// FrameBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct FrameBuilder {
    event_name: Option<String>,
    payload: Option<String>,
    discarding: bool,
}

impl FrameBuilder {
    /// Feed one line. Returns a frame when `line` terminates a non-empty one.
    fn add(&mut self, line: Line) -> Option<Frame> {
        if self.discarding {
            if line == Line::Empty {
                *self = Self::default();
            }
            return None;
        }
        match line {
            Line::Empty => self.dispatch(),
            Line::Field {
                name: FieldName::Event,
                value,
            } => {
                self.event_name = value.filter(|v| !v.is_empty());
                None
            }
            Line::Field {
                name: FieldName::Data,
                value,
            } => {
                let value = value.unwrap_or_default();
                match &mut self.payload {
                    Some(payload) => {
                        payload.push('\n');
                        payload.push_str(&value);
                    }
                    None => self.payload = Some(value),
                }
                None
            }
            Line::Comment
            | Line::Field {
                name: FieldName::Ignored,
                ..
            } => None,
        }
    }

    /// Drop the frame in progress, including its remaining lines.
    fn discard(&mut self) {
        *self = Self {
            discarding: true,
            ..Self::default()
        };
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let FrameBuilder {
            event_name,
            payload,
            ..
        } = core::mem::take(self);
        let frame = Frame {
            event_name,
            payload,
        };
        (!frame.is_empty()).then_some(frame)
    }
}

// ---------------------------------------------------------------------------
// FrameParser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
enum ParserState {
    #[default]
    NotStarted,
    Started,
    Finished,
}

const fn starts_with_bom(buf: &[u8]) -> Option<bool> {
    match buf.len() {
        0 => None,
        1 => {
            if buf[0] == BOM[0] {
                None
            } else {
                Some(false)
            }
        }
        2 => {
            if buf[0] == BOM[0] && buf[1] == BOM[1] {
                None
            } else {
                Some(false)
            }
        }
        _gte_3 => Some(buf[0] == BOM[0] && buf[1] == BOM[1] && buf[2] == BOM[2]),
    }
}

/// Incremental, push-based frame parser.
///
/// Feed chunks with [`extend`](FrameParser::extend) and drain complete frames
/// with [`next_frame`](FrameParser::next_frame). Trailing partial lines stay
/// buffered until the rest arrives. A leading UTF-8 BOM is stripped, and
/// LF, CRLF and lone CR all terminate a line.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: BytesMut,
    builder: FrameBuilder,
    state: ParserState,
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of input.
    pub fn extend(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(chunk);

        if matches!(self.state, ParserState::NotStarted) {
            match starts_with_bom(&self.buffer) {
                Some(true) => {
                    self.state = ParserState::Started;
                    self.buffer.advance(BOM.len());
                }
                Some(false) => self.state = ParserState::Started,
                None => {}
            }
        }
    }

    /// Mark the input as complete.
    ///
    /// A buffered trailing CR is now known to be a standalone line ending.
    /// A frame without its terminating blank line is never emitted.
    pub fn finish(&mut self) {
        self.state = ParserState::Finished;
        if self.buffer.last().is_some_and(|&last| last == CR) {
            self.buffer.put_u8(LF);
        }
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns the UTF-8 error of an `event:`/`data:` line with invalid bytes.
    /// The frame that line belongs to is dropped and the parser stays usable:
    /// the next call resumes with the following frame.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Utf8Error> {
        // Wait until the BOM check could be decided.
        if matches!(self.state, ParserState::NotStarted) {
            return Ok(None);
        }
        while let Some(line) = parse_line_from_buffer(&mut self.buffer) {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.builder.discard();
                    return Err(e);
                }
            };
            if let Some(frame) = self.builder.add(line) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Feed one chunk and collect every frame it completes.
    ///
    /// # Errors
    ///
    /// See [`next_frame`](FrameParser::next_frame).
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, Utf8Error> {
        self.extend(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Bytes not yet consumed (an incomplete trailing line).
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

// ---------------------------------------------------------------------------
// FrameStream
// ---------------------------------------------------------------------------

pin_project_lite::pin_project! {
    /// A lazy [`Stream`] of [`Frame`]s over a stream of byte chunks.
    ///
    /// Frames are yielded as soon as they are complete. A
    /// [`FrameStreamError::Utf8Error`] only drops the offending frame; polling
    /// again continues with the next one. The stream is not restartable: once
    /// the underlying stream ends or fails, reopening is the caller's job.
    #[project = FrameStreamProjection]
    #[derive(Debug)]
    pub struct FrameStream<S> {
        #[pin]
        stream: S,
        parser: FrameParser,
        terminated: bool,
    }
}

impl<S> FrameStream<S> {
    /// Create a new [`FrameStream`] from an underlying byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            parser: FrameParser::new(),
            terminated: false,
        }
    }
}

impl<S, E, B> Stream for FrameStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Frame, FrameStreamError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match this.parser.next_frame() {
                Ok(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
                Ok(None) => {}
                Err(e) => return Poll::Ready(Some(Err(e.into()))),
            }

            if *this.terminated {
                return Poll::Ready(None);
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(bytes)) => this.parser.extend(bytes.as_ref()),
                Some(Err(e)) => return Poll::Ready(Some(Err(FrameStreamError::Transport(e)))),
                None => {
                    *this.terminated = true;
                    this.parser.finish();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::StreamExt;
    use proptest::prelude::*;

    use super::*;

    async fn collect(chunks: &[&'static [u8]]) -> Vec<Frame> {
        FrameStream::new(futures_util::stream::iter(
            chunks
                .iter()
                .map(|c| Ok::<_, ()>(Bytes::from_static(*c))),
        ))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .filter_map(Result::ok)
        .collect()
    }

    const RUN_COMPLETED: &[u8] = b"event: run_completed\ndata: {\"a\":1}\n\n";

    #[tokio::test]
    async fn single_chunk_frame() {
        assert_eq!(
            collect(&[RUN_COMPLETED]).await,
            vec![Frame::new(Some("run_completed"), Some("{\"a\":1}"))]
        );
    }

    #[tokio::test]
    async fn frame_split_across_chunks() {
        assert_eq!(
            collect(&[
                b"ev",
                b"ent: run_comp",
                b"",
                b"leted\r",
                b"\ndata: {\"a\"",
                b":1}\n",
                b"\n",
            ])
            .await,
            vec![Frame::new(Some("run_completed"), Some("{\"a\":1}"))]
        );
    }

    #[tokio::test]
    async fn multi_line_data_is_joined() {
        assert_eq!(
            collect(&[b"data: {\"a\":\ndata: 1}\n\n"]).await,
            vec![Frame::new(None, Some("{\"a\":\n1}"))]
        );
    }

    #[tokio::test]
    async fn several_frames_and_keepalives() {
        assert_eq!(
            collect(&[
                b": ping\n\nevent: delta\ndata: 1\n\nid: 3\n\nevent: done\n\n"
            ])
            .await,
            vec![
                Frame::new(Some("delta"), Some("1")),
                Frame::new(Some("done"), None),
            ]
        );
    }

    #[tokio::test]
    async fn unterminated_frame_is_dropped() {
        assert_eq!(collect(&[b"data: half\n"]).await, vec![]);
    }

    #[tokio::test]
    async fn bom_handling() {
        assert_eq!(
            collect(&[b"\xEF\xBB", b"\xBFdata: x\n\n"]).await,
            vec![Frame::new(None, Some("x"))]
        );
        assert_eq!(
            collect(&[b":\n", b"data: y\n\n"]).await,
            vec![Frame::new(None, Some("y"))]
        );
    }

    #[tokio::test]
    async fn trailing_cr_terminates_at_end() {
        assert_eq!(
            collect(&[b"data: test\r\r"]).await,
            vec![Frame::new(None, Some("test"))]
        );
    }

    #[tokio::test]
    async fn transport_error_is_surfaced() {
        let chunks = vec![Ok(Bytes::from_static(b"data: 1\n\n")), Err("reset")];
        let items = FrameStream::new(futures_util::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok(Frame::new(None, Some("1"))));
        assert_eq!(items[1], Err(FrameStreamError::Transport("reset")));
    }

    #[tokio::test]
    async fn invalid_utf8_drops_only_its_frame() {
        let chunks: Vec<Result<Bytes, ()>> = vec![
            Ok(Bytes::from_static(b"data: 1\n\nevent: step\ndata: \xFF\ndata: more\n\n")),
            Ok(Bytes::from_static(b"data: 2\n\n")),
        ];
        let items = FrameStream::new(futures_util::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Ok(Frame::new(None, Some("1"))));
        assert!(matches!(items[1], Err(FrameStreamError::Utf8Error(_))));
        assert_eq!(items[2], Ok(Frame::new(None, Some("2"))));
    }

    #[test]
    fn push_api_holds_back_partial_lines() {
        let mut parser = FrameParser::new();
        assert!(parser.push(b"data: a").expect("utf-8").is_empty());
        assert_eq!(parser.pending(), b"data: a");
        assert_eq!(
            parser.push(b"\n\ndata: b\n\n").expect("utf-8"),
            vec![Frame::new(None, Some("a")), Frame::new(None, Some("b"))]
        );
    }

    fn split_at_points(input: &[u8], mut points: Vec<usize>) -> Vec<Vec<u8>> {
        points.sort_unstable();
        points.dedup();
        let mut chunks = Vec::new();
        let mut start = 0;
        for p in points.into_iter().filter(|&p| p > 0 && p < input.len()) {
            chunks.push(input[start..p].to_vec());
            start = p;
        }
        chunks.push(input[start..].to_vec());
        chunks
    }

    proptest! {
        #[test]
        fn chunk_boundaries_do_not_matter(points in proptest::collection::vec(0usize..64, 0..12)) {
            let input = b"event: step\ndata: {\"seq\":1}\n\n: hb\r\nevent: run_completed\r\ndata: {\"a\":\r\ndata: 1}\r\n\r\n";
            let mut parser = FrameParser::new();
            let mut frames = Vec::new();
            for chunk in split_at_points(input, points) {
                frames.extend(parser.push(&chunk).expect("utf-8"));
            }
            parser.finish();
            while let Some(frame) = parser.next_frame().expect("utf-8") {
                frames.push(frame);
            }
            prop_assert_eq!(
                frames,
                vec![
                    Frame::new(Some("step"), Some("{\"seq\":1}")),
                    Frame::new(Some("run_completed"), Some("{\"a\":\n1}")),
                ]
            );
        }
    }
}
