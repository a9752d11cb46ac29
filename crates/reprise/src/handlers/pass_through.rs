//! Live forwarding, optionally rewritten to the loopback address.

use crate::chain::{Handler, Next, Outcome};
use crate::error::ReplayError;
use crate::hosts::HostMatcher;
use crate::message::Request;
use crate::metrics;
use crate::session::Session;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const LOOPBACK: &str = "127.0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Send to the request's own host
    Direct,
    /// Send to 127.0.0.1, keeping scheme, port and path
    Loopback,
}

/// Sends matching requests to the network.
///
/// Hosts on the session's dropped list fail with `ConnectionDropped` instead of
/// being sent.
pub struct PassThrough {
    name: String,
    matcher: HostMatcher,
    route: Route,
    session: Arc<Session>,
    transport: Arc<dyn Transport>,
}

impl PassThrough {
    pub fn new(
        matcher: impl Into<HostMatcher>,
        session: Arc<Session>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let matcher = matcher.into();
        Self {
            name: format!("pass-through({matcher:?})"),
            matcher,
            route: Route::Direct,
            session,
            transport,
        }
    }

    /// Forward everything, the tail of the default chain.
    pub fn always(session: Arc<Session>, transport: Arc<dyn Transport>) -> Self {
        Self::new(true, session, transport).named("live")
    }

    /// Route hosts on the session's localhost list to 127.0.0.1, whatever the mode.
    pub fn localhost(session: Arc<Session>, transport: Arc<dyn Transport>) -> Self {
        let hosts = session.clone();
        Self {
            name: "localhost".to_string(),
            matcher: HostMatcher::predicate(move |request| hosts.is_localhost(request.host())),
            route: Route::Loopback,
            session,
            transport,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    async fn forward(&self, request: &Request) -> Outcome {
        let routed;
        let target = match self.route {
            Route::Direct => request,
            Route::Loopback => {
                routed = match request.with_host(LOOPBACK) {
                    Ok(routed) => routed,
                    Err(err) => return Outcome::Failed(err),
                };
                &routed
            }
        };

        let method = request.method.as_str();
        let started = Instant::now();
        let result = self.transport.send(target).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(response) => {
                metrics::record_live_duration(method, response.status, elapsed_ms);
                let outcome = match self.route {
                    Route::Direct => "passed_through",
                    Route::Loopback => "localhost",
                };
                metrics::record_outcome(method, outcome);
                debug!(
                    "{} {} {} -> {} in {:.1}ms",
                    self.name, method, target.uri, response.status, elapsed_ms
                );
            }
            Err(err) => {
                metrics::record_live_duration(method, 0, elapsed_ms);
                metrics::record_outcome(method, "error");
                warn!("{} {} {} failed: {}", self.name, method, target.uri, err);
            }
        }
        result.into()
    }
}

#[async_trait]
impl Handler for PassThrough {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, request: &Request, _next: Next<'_>) -> Outcome {
        if !self.matcher.matches(request) {
            return Outcome::Declined;
        }

        let host = request.host();
        if self.session.is_dropped(host) {
            metrics::record_outcome(request.method.as_str(), "dropped");
            debug!("Dropping connection to {}", host);
            return Outcome::Failed(ReplayError::ConnectionDropped(host.to_string()));
        }

        self.forward(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::chain::Chain;
    use crate::mode::Mode;
    use crate::testing::StubTransport;

    fn session() -> Arc<Session> {
        Arc::new(Session::new(Mode::Replay, Catalog::with_file_store()))
    }

    fn chain_with(handler: PassThrough) -> Chain {
        let chain = Chain::new();
        chain.prepend(handler);
        chain
    }

    #[tokio::test]
    async fn test_matching_request_goes_live() {
        let transport = Arc::new(StubTransport::ok("live"));
        let chain = chain_with(PassThrough::new("api.example.com", session(), transport.clone()));

        let request = Request::get("http://api.example.com/x").unwrap();
        let response = chain.start(&request).await.unwrap();
        assert_eq!(response.text(), "live");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_matching_request_declines() {
        let transport = Arc::new(StubTransport::ok("live"));
        let chain = chain_with(PassThrough::new("*.example.com", session(), transport.clone()));

        let request = Request::get("http://example.org/").unwrap();
        let err = chain.start(&request).await.unwrap_err();
        assert!(matches!(err, ReplayError::ChainExhausted { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_host_fails_without_network() {
        let session = session();
        session.drop_host(["tracker.example.com"]);
        let transport = Arc::new(StubTransport::ok("live"));
        let chain = chain_with(PassThrough::always(session, transport.clone()));

        let request = Request::get("http://tracker.example.com/pixel").unwrap();
        let err = chain.start(&request).await.unwrap_err();
        assert!(matches!(err, ReplayError::ConnectionDropped(host) if host == "tracker.example.com"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_localhost_rewrites_host() {
        let session = session();
        session.localhost(["*.dev.test"]);
        let transport = Arc::new(StubTransport::ok("local"));
        let chain = chain_with(PassThrough::localhost(session, transport.clone()));

        let request = Request::get("https://api.dev.test:8443/health?deep=1").unwrap();
        let response = chain.start(&request).await.unwrap();
        assert_eq!(response.text(), "local");
        assert_eq!(
            transport.last_uri().as_deref(),
            Some("https://127.0.0.1:8443/health?deep=1")
        );
        assert_eq!(
            transport.last_header("host").as_deref(),
            Some("api.dev.test:8443")
        );

        let elsewhere = Request::get("https://api.prod.test/").unwrap();
        assert!(chain.start(&elsewhere).await.is_err());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = Arc::new(StubTransport::failing("connection refused"));
        let chain = chain_with(PassThrough::always(session(), transport));

        let request = Request::get("http://api.example.com/").unwrap();
        let err = chain.start(&request).await.unwrap_err();
        assert!(matches!(err, ReplayError::Transport(_)));
    }

    #[test]
    fn test_names() {
        let transport: Arc<dyn Transport> = Arc::new(StubTransport::ok(""));
        assert_eq!(PassThrough::always(session(), transport.clone()).name(), "live");
        assert_eq!(PassThrough::localhost(session(), transport.clone()).name(), "localhost");
        assert_eq!(
            PassThrough::new("a.test", session(), transport).name(),
            "pass-through(Exact(\"a.test\"))"
        );
    }
}
