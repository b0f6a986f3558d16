//! The seam between stream consumption and the HTTP layer.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use url::Url;

use crate::error::{TransportError, TransportResult};

/// Query parameter carrying the resumption cursor.
pub const AFTER_SEQ_PARAM: &str = "afterSeq";

/// A boxed stream of raw body chunks.
pub type ByteStream = BoxStream<'static, TransportResult<Bytes>>;

/// Opens one streaming connection for a resource.
///
/// [`ApiClient`](crate::ApiClient) is the production implementation; tests
/// plug in scripted sources.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open `{resource}/stream`, resuming after `after_seq` when given.
    ///
    /// # Errors
    ///
    /// A transport failure or a non-2xx status. Either is fatal for this
    /// attempt only.
    async fn open(&self, resource: &str, after_seq: Option<u64>) -> TransportResult<ByteStream>;
}

#[async_trait]
impl<S: EventSource + ?Sized> EventSource for std::sync::Arc<S> {
    async fn open(&self, resource: &str, after_seq: Option<u64>) -> TransportResult<ByteStream> {
        (**self).open(resource, after_seq).await
    }
}

/// Build the stream URL for a resource URL: `{resource}/stream`, with any
/// existing query kept and `afterSeq` set when the cursor is non-zero.
///
/// # Errors
///
/// A configuration error if `resource` cannot carry a path (`mailto:` and
/// the like).
pub fn stream_url(mut resource: Url, after_seq: Option<u64>) -> TransportResult<Url> {
    {
        let Ok(mut segments) = resource.path_segments_mut() else {
            return Err(TransportError::config(
                "Stream resource URL cannot carry a path",
            ));
        };
        segments.pop_if_empty().push("stream");
    }

    let kept: Vec<(String, String)> = resource
        .query_pairs()
        .filter(|(key, _)| key != AFTER_SEQ_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let after_seq = after_seq.filter(|&seq| seq > 0);

    resource.set_query(None);
    if !kept.is_empty() || after_seq.is_some() {
        let mut query = resource.query_pairs_mut();
        query.extend_pairs(kept);
        if let Some(seq) = after_seq {
            query.append_pair(AFTER_SEQ_PARAM, &seq.to_string());
        }
    }
    Ok(resource)
}
