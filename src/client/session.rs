//! Version-negotiating session over a [`Connection`].

use crate::client::connection::Connection;
use crate::config::ClientConfig;
use crate::error::{Result, ThorwireError};
use crate::protocol::api_versions::{
    ApiVersionsRequestBuilder, ApiVersionsResponse, API_VERSIONS_RANGE,
};
use crate::protocol::header::{Request, RequestBuilder};
use crate::types::{api_key, error_code, SupportedApiVersions, VersionRange};
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{debug, info, warn};

pub struct Session {
    connection: Connection,
    correlation_id: AtomicI32,
    api_versions: SupportedApiVersions,
}

impl Session {
    /// Connect to `host:port` and negotiate API versions.
    pub async fn create(
        host: &str,
        port: u16,
        client_id: Option<String>,
        client_software_name: impl Into<String>,
        client_software_version: impl Into<String>,
    ) -> Result<Self> {
        let config = ClientConfig::default()
            .with_client_id(client_id)
            .with_client_software(client_software_name, client_software_version);
        Self::connect(host, port, &config).await
    }

    /// Like [`Session::create`] with every setting taken from `config`.
    pub async fn connect(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let connection = Connection::connect(host, port, config).await?;
        Self::handshake(connection, config).await
    }

    /// Negotiate API versions over an already established connection.
    ///
    /// ApiVersions is sent at the highest bootstrap version. A broker that
    /// rejects that version with UNSUPPORTED_VERSION still reports its own
    /// ApiVersions range, and the request is retried once at the top of it.
    pub async fn handshake(connection: Connection, config: &ClientConfig) -> Result<Self> {
        let builder = ApiVersionsRequestBuilder::new(
            config.client_id.clone(),
            config.client_software_name.clone(),
            config.client_software_version.clone(),
        );
        let mut correlation_id = 0;

        let request = builder.build(
            correlation_id,
            API_VERSIONS_RANGE.min,
            API_VERSIONS_RANGE.max,
        )?;
        correlation_id += 1;
        let mut response = connection.send(request).await?;

        if response.error_code == error_code::UNSUPPORTED_VERSION {
            let fallback = response
                .supported_versions()
                .get(&api_key::API_VERSIONS)
                .copied()
                .unwrap_or(VersionRange::new(0, 0));
            warn!(
                broker_range = %fallback,
                "broker rejected bootstrap ApiVersions version, retrying"
            );
            let request = builder.build(correlation_id, fallback.min, fallback.max)?;
            correlation_id += 1;
            response = connection.send(request).await?;
        }

        let api_versions = Self::accept(response)?;
        info!(apis = api_versions.len(), "negotiated api versions");
        Ok(Self {
            connection,
            correlation_id: AtomicI32::new(correlation_id),
            api_versions,
        })
    }

    fn accept(response: ApiVersionsResponse) -> Result<SupportedApiVersions> {
        if response.error_code != error_code::NONE {
            return Err(ThorwireError::Api {
                api_key: api_key::API_VERSIONS,
                error_code: response.error_code,
            });
        }
        if response.api_keys.is_none() {
            return Err(ThorwireError::Decoding(
                "null api key array in ApiVersions response".into(),
            ));
        }
        Ok(response.supported_versions())
    }

    /// Build the request at the negotiated version and send it.
    ///
    /// Fails with `UnsupportedApi` without touching the connection when the
    /// broker did not advertise the builder's api key.
    pub async fn send<B: RequestBuilder>(
        &self,
        builder: &B,
    ) -> Result<<B::Request as Request>::Response> {
        let api_key = builder.api_key();
        let range = self
            .api_versions
            .get(&api_key)
            .copied()
            .ok_or(ThorwireError::UnsupportedApi { api_key })?;
        let correlation_id = self.next_correlation_id();
        let request = builder.build(correlation_id, range.min, range.max)?;
        debug!(api_key, api_version = request.api_version(), correlation_id, "session send");
        self.connection.send(request).await
    }

    pub fn is_healthy(&self) -> bool {
        self.connection.is_healthy()
    }

    pub fn api_versions(&self) -> &SupportedApiVersions {
        &self.api_versions
    }

    pub fn version_range(&self, api_key: i16) -> Option<VersionRange> {
        self.api_versions.get(&api_key).copied()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn next_correlation_id(&self) -> i32 {
        self.correlation_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .field("apis", &self.api_versions.len())
            .finish()
    }
}
