//! Transport seam for the push stream.
//!
//! The stream client only sees these two capabilities, so the reconnection
//! machinery is testable against a scripted fake with no network involved.

use crate::model::ConsoleConfig;
use crate::stream::sse::{SseDecoder, SseFrame};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;

#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// One connection attempt; returning `Ok` means the stream is open.
    async fn connect(&self) -> Result<Box<dyn StreamConnection>>;
}

#[async_trait]
pub trait StreamConnection: Send {
    /// Next decoded frame. `Ok(None)` means the server closed the stream;
    /// `Err` means the transport failed mid-stream. Both send the client
    /// back through its reconnection policy.
    async fn next_frame(&mut self) -> Result<Option<SseFrame>>;
}

pub struct HttpStreamTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpStreamTransport {
    pub fn new(cfg: &ConsoleConfig) -> Result<Self> {
        // No overall request timeout: the stream is long-lived by design.
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build stream http client")?;
        Ok(Self {
            http,
            url: format!("{}/deploy/stream", cfg.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn connect(&self) -> Result<Box<dyn StreamConnection>> {
        let resp = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .context("open /deploy/stream")?
            .error_for_status()
            .context("/deploy/stream returned an error")?;
        Ok(Box::new(HttpStreamConnection {
            body: resp.bytes_stream().boxed(),
            decoder: SseDecoder::default(),
            ready: VecDeque::new(),
        }))
    }
}

struct HttpStreamConnection {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<SseFrame>,
}

#[async_trait]
impl StreamConnection for HttpStreamConnection {
    async fn next_frame(&mut self) -> Result<Option<SseFrame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.feed(&chunk)),
                Some(Err(e)) => return Err(e).context("read /deploy/stream"),
                None => return Ok(None),
            }
        }
    }
}
