//! The `StreamOpener` trait: the seam between the streaming engine and
//! whatever actually speaks HTTP.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::TransportError;
use crate::oauth::SignedRequest;

/// A raw, unbounded byte stream from one streaming connection.
///
/// Dropping the stream must release the underlying connection; that is how
/// a transport worker cancels a pending read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens a long-lived byte stream for a signed request.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the registry shares one opener
/// across every connect call as `Arc<dyn StreamOpener>`.
#[async_trait]
pub trait StreamOpener: Send + Sync + 'static {
    /// Issue `request` and return its response body as a byte stream once
    /// the server has accepted it.
    async fn open(&self, request: &SignedRequest) -> Result<ByteStream, TransportError>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "stream-opener"
    }
}
