//! hyper transport: request conversion, pooled client and response collection.

use super::tls::{install_crypto_provider, AcceptAnyServerCert};
use super::Transport;
use crate::config::TransportConfig;
use crate::error::{ReplayError, Result};
use crate::fingerprint::canonical_url;
use crate::message::{BodyChunk, Request, Response};
use async_trait::async_trait;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::{HeaderMap, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Type alias for the pooled HTTP client.
pub type HttpClient =
    Client<hyper_rustls::HttpsConnector<HttpConnector>, BoxBody<Bytes, hyper::Error>>;

/// Transport backed by hyper-util's pooled client, speaking HTTP/1.1 over plain TCP
/// or rustls.
#[derive(Clone)]
pub struct HyperTransport {
    client: HttpClient,
}

impl HyperTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        install_crypto_provider();

        let mut http_connector = HttpConnector::new();
        http_connector.set_keepalive(Some(Duration::from_secs(config.keepalive_timeout_secs)));
        http_connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        http_connector.enforce_http(false);

        let https_connector = if config.tls_skip_verify {
            warn!("TLS certificate verification DISABLED for live requests (development/testing only)");
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_tls_config(
                    rustls::ClientConfig::builder()
                        .dangerous()
                        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                        .with_no_client_auth(),
                )
                .https_or_http()
                .enable_http1()
                .wrap_connector(http_connector)
        } else {
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| {
                    ReplayError::Configuration(format!("Failed to load native root certificates: {e}"))
                })?
                .https_or_http()
                .enable_http1()
                .wrap_connector(http_connector)
        };

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(https_connector);

        info!(
            "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s, connect_timeout={}s",
            config.max_idle_per_host,
            config.idle_timeout_secs,
            config.keepalive_timeout_secs,
            config.connect_timeout_secs
        );

        Ok(Self { client })
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        let url = canonical_url(&request.uri);
        debug!("Sending {} {} to the network", request.method, url);

        let upstream = to_hyper_request(request);
        let response = self
            .client
            .request(upstream)
            .await
            .map_err(|e| ReplayError::Transport(format!("{} {url}: {}", request.method, describe(&e))))?;

        let (parts, body) = response.into_parts();
        let (chunks, trailers) = read_frames(body).await.map_err(|e| {
            ReplayError::Transport(format!(
                "{} {url}: failed to read response body: {}",
                request.method,
                describe(&e)
            ))
        })?;

        let mut response = Response::new(parts.status.as_u16());
        response.version = version_label(parts.version).to_string();
        response.headers = header_pairs(&parts.headers);
        response.body = chunks;
        response.trailers = trailers;
        Ok(response)
    }
}

fn to_hyper_request(request: &Request) -> hyper::Request<BoxBody<Bytes, hyper::Error>> {
    let mut upstream = hyper::Request::new(request_body(request));
    *upstream.method_mut() = request.method.clone();
    *upstream.uri_mut() = request.uri.clone();
    *upstream.headers_mut() = request.headers.clone();
    upstream
}

/// Body with a known length when possible, chunked frames when there are several
/// chunks or trailers.
fn request_body(request: &Request) -> BoxBody<Bytes, hyper::Error> {
    match (request.body.as_slice(), &request.trailers) {
        ([], None) => BoxBody::new(Empty::<Bytes>::new().map_err(|never: Infallible| match never {})),
        ([chunk], None) => BoxBody::new(
            Full::new(chunk.clone()).map_err(|never: Infallible| match never {}),
        ),
        (chunks, trailers) => {
            let mut frames: Vec<std::result::Result<Frame<Bytes>, Infallible>> = chunks
                .iter()
                .cloned()
                .map(|chunk| Ok(Frame::data(chunk)))
                .collect();
            if let Some(trailers) = trailers {
                frames.push(Ok(Frame::trailers(trailers.clone())));
            }
            BoxBody::new(
                StreamBody::new(futures::stream::iter(frames))
                    .map_err(|never: Infallible| match never {}),
            )
        }
    }
}

/// Read a body one frame at a time, one chunk per non-empty data frame.
async fn read_frames<B>(
    mut body: B,
) -> std::result::Result<(Vec<BodyChunk>, Vec<(String, String)>), B::Error>
where
    B: hyper::body::Body<Data = Bytes> + Unpin,
{
    let mut chunks = Vec::new();
    let mut trailers = Vec::new();
    while let Some(frame) = body.frame().await {
        match frame?.into_data() {
            Ok(data) if data.is_empty() => {}
            Ok(data) => chunks.push(BodyChunk::new(data)),
            Err(frame) => {
                if let Ok(map) = frame.into_trailers() {
                    trailers.extend(header_pairs(&map));
                }
            }
        }
    }
    Ok((chunks, trailers))
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

/// Error message including its source chain.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
