//! In-process broker stand-in shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use thorwire::client::frame::frame;
use thorwire::protocol::{
    ReadBuffer, Request, RequestBuilder, RequestHeader, ResponseHeaderV0, WriteBuffer,
};
use thorwire::types::{api_key, VersionRange};
use thorwire::{ClientConfig, Connection, FrameReader};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream};

/// Broker end of a client connection: reads request frames, writes raw bytes.
pub struct MockBroker<S> {
    stream: S,
    frames: FrameReader,
}

/// Connection wired to a [`MockBroker`] over an in-memory pipe.
pub fn pair(config: &ClientConfig) -> (Connection, MockBroker<DuplexStream>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (Connection::new(client, config), MockBroker::new(server))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl<S: AsyncRead + AsyncWrite + Unpin> MockBroker<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            frames: FrameReader::default(),
        }
    }

    /// Next request header and body, or `None` once the client hung up.
    pub async fn try_next_request(&mut self) -> Option<(RequestHeader, ReadBuffer)> {
        loop {
            if let Some(mut frame) = self.frames.next_frame().unwrap() {
                let header = RequestHeader::decode(&mut frame, |key, version| {
                    key == api_key::API_VERSIONS && version >= 3
                })
                .unwrap();
                return Some((header, frame));
            }
            if self.frames.read_from(&mut self.stream).await.unwrap_or(0) == 0 {
                return None;
            }
        }
    }

    pub async fn next_request(&mut self) -> (RequestHeader, ReadBuffer) {
        self.try_next_request()
            .await
            .expect("client closed the connection")
    }

    pub async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Frame and send a v0-header response.
    pub async fn respond(&mut self, correlation_id: i32, body: &[u8]) {
        let framed = response_frame(correlation_id, body);
        self.write(&framed).await;
    }
}

/// `[length][correlation_id][body]`.
pub fn response_frame(correlation_id: i32, body: &[u8]) -> Bytes {
    let mut payload = WriteBuffer::new();
    payload.put_i32(correlation_id);
    payload.put_slice(body);
    frame(payload.as_slice()).unwrap()
}

/// Api key used by the test request; not a real broker API.
pub const PING_API_KEY: i16 = 1000;

/// Sends an int32 and expects an int32 back.
#[derive(Debug, Clone)]
pub struct PingRequest {
    pub version: i16,
    pub value: i32,
}

impl PingRequest {
    pub fn new(value: i32) -> Self {
        Self { version: 0, value }
    }
}

impl Request for PingRequest {
    type ResponseHeader = ResponseHeaderV0;
    type Response = i32;

    fn api_key(&self) -> i16 {
        PING_API_KEY
    }

    fn api_version(&self) -> i16 {
        self.version
    }

    fn header(&self, correlation_id: i32) -> RequestHeader {
        RequestHeader::v1(PING_API_KEY, self.version, correlation_id, Some("test".into()))
    }

    fn encode_body(&self, buf: &mut WriteBuffer) -> thorwire::Result<()> {
        buf.put_i32(self.value);
        Ok(())
    }

    fn decode_response(&self, buf: &mut ReadBuffer) -> thorwire::Result<i32> {
        buf.read_i32()
    }
}

pub struct PingBuilder {
    pub versions: VersionRange,
    pub value: i32,
}

impl RequestBuilder for PingBuilder {
    type Request = PingRequest;

    fn api_key(&self) -> i16 {
        PING_API_KEY
    }

    fn supported_versions(&self) -> VersionRange {
        self.versions
    }

    fn build(&self, _correlation_id: i32, min: i16, max: i16) -> thorwire::Result<PingRequest> {
        Ok(PingRequest {
            version: self.select_version(min, max)?,
            value: self.value,
        })
    }
}
