//! The remote audio endpoint a capture reads from.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};

use crate::error::CaptureError;

/// Chunks of the opened stream, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CaptureError>> + Send>>;

#[async_trait]
pub trait AudioSource: Send + Sync + 'static {
    /// Connect and return the body stream. Anything other than a ready 200
    /// stream is an error.
    async fn open(&self) -> Result<ByteStream, CaptureError>;
}

/// Streams the body of a plain HTTP(S) GET.
#[derive(Debug, Clone)]
pub struct HttpAudioSource {
    url: String,
    client: Client,
}

impl HttpAudioSource {
    pub fn new(url: impl Into<String>) -> Result<Self, CaptureError> {
        let client = Client::builder()
            .user_agent(concat!("recs4m/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { url: url.into(), client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AudioSource for HttpAudioSource {
    async fn open(&self) -> Result<ByteStream, CaptureError> {
        let resp = self.client.get(&self.url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(CaptureError::Status(resp.status().as_u16()));
        }
        Ok(Box::pin(resp.bytes_stream().map(|chunk| chunk.map_err(CaptureError::from))))
    }
}
