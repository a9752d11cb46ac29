//! The request-issuing facade applications hold on to.

use crate::chain::{Chain, Handler};
use crate::config::Config;
use crate::error::Result;
use crate::handlers::{Logger, PassThrough, Recorder, Replay};
use crate::hosts::HostMatcher;
use crate::message::{Request, Response};
use crate::mode::Mode;
use crate::session::Session;
use crate::transport::{HyperTransport, Transport};
use std::sync::Arc;

/// Sends requests through the interception chain of one session.
pub struct Client {
    session: Arc<Session>,
    chain: Chain,
}

impl Client {
    /// Client with the default chain:
    /// logger, localhost, pass-through hosts (or everything in bloody mode),
    /// replay, recorder, live.
    pub fn new(session: Arc<Session>, transport: Arc<dyn Transport>) -> Self {
        let chain = default_chain(&session, &transport);
        Self { session, chain }
    }

    /// Client with a hyper transport, configured from a [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let session = Arc::new(Session::from_config(config)?);
        let transport: Arc<dyn Transport> = Arc::new(HyperTransport::new(&config.transport)?);
        Ok(Self::new(session, transport))
    }

    /// Client with a caller-assembled chain.
    pub fn with_chain(session: Arc<Session>, chain: Chain) -> Self {
        Self { session, chain }
    }

    /// Register a handler ahead of everything registered before it.
    pub fn use_handler(&self, handler: impl Handler + 'static) -> &Self {
        self.chain.prepend(handler);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    pub fn pass_through<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) -> &Self {
        self.session.pass_through(hosts);
        self
    }

    pub fn drop_host<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) -> &Self {
        self.session.drop_host(hosts);
        self
    }

    pub fn localhost<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) -> &Self {
        self.session.localhost(hosts);
        self
    }

    pub fn reset<S: AsRef<str>>(&self, hosts: impl IntoIterator<Item = S>) -> &Self {
        self.session.reset(hosts);
        self
    }

    pub fn is_pass_through(&self, host: &str) -> bool {
        self.session.is_pass_through(host)
    }

    pub fn is_dropped(&self, host: &str) -> bool {
        self.session.is_dropped(host)
    }

    pub fn is_localhost(&self, host: &str) -> bool {
        self.session.is_localhost(host)
    }

    /// Issue a request.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.chain.start(&request).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Assemble the default chain for a session.
pub fn default_chain(session: &Arc<Session>, transport: &Arc<dyn Transport>) -> Chain {
    let chain = Chain::new();

    let hosts = session.clone();
    let pass_through = HostMatcher::predicate(move |request| {
        hosts.mode() == Mode::Bloody || hosts.is_pass_through(request.host())
    });

    chain
        .prepend(PassThrough::always(session.clone(), transport.clone()))
        .prepend(Recorder::new(session.clone()))
        .prepend(Replay::new(session.clone()))
        .prepend(PassThrough::new(pass_through, session.clone(), transport.clone()).named("pass-through"))
        .prepend(PassThrough::localhost(session.clone(), transport.clone()))
        .prepend(Logger::new(session.clone()));
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::chain::{Next, Outcome};
    use crate::error::ReplayError;
    use crate::testing::StubTransport;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn client(mode: Mode, dir: &TempDir, transport: &Arc<StubTransport>) -> Client {
        let catalog = Catalog::with_file_store();
        catalog.set_fixtures_dir(dir.path()).unwrap();
        let session = Arc::new(Session::new(mode, catalog));
        Client::new(session, transport.clone())
    }

    fn get(url: &str) -> Request {
        Request::get(url).unwrap()
    }

    #[test]
    fn test_default_chain_order() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(""));
        let client = client(Mode::Replay, &dir, &transport);
        assert_eq!(
            client.chain().names(),
            vec!["logger", "localhost", "pass-through", "replay", "recorder", "live"]
        );
    }

    #[tokio::test]
    async fn test_from_config_rejects_record_mode_without_fixtures() {
        let result = Client::from_config(&Config::default().with_mode(Mode::Record));
        assert!(matches!(result, Err(ReplayError::Configuration(_))));

        let client = Client::from_config(&Config::default().with_mode(Mode::Bloody)).unwrap();
        assert_eq!(client.mode(), Mode::Bloody);
    }

    #[tokio::test]
    async fn test_replay_mode_never_touches_network() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok("live"));
        let client = client(Mode::Replay, &dir, &transport);

        let err = client.send(get("http://api.example.com/users")).await.unwrap_err();
        assert!(matches!(err, ReplayError::NoFixture { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_record_then_replay_round_trip() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::responding(
            Response::new(200)
                .with_header("content-type", "application/json")
                .with_body("{\"id\":1}"),
        ));
        let recorded = client(Mode::Record, &dir, &live)
            .send(get("http://api.example.com/users/1"))
            .await
            .unwrap();
        assert_eq!(live.calls(), 1);

        let offline = Arc::new(StubTransport::failing("offline"));
        let replayed = client(Mode::Replay, &dir, &offline)
            .send(
                get("http://api.example.com/users/1")
                    .header("user-agent", "different/2.0")
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(replayed, recorded);
        assert_eq!(offline.calls(), 0);
    }

    #[tokio::test]
    async fn test_record_mode_replays_existing_fixture() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::ok("first"));
        client(Mode::Record, &dir, &live)
            .send(get("http://api.example.com/"))
            .await
            .unwrap();

        let second = Arc::new(StubTransport::ok("second"));
        let client = client(Mode::Record, &dir, &second);
        assert_eq!(client.send(get("http://api.example.com/")).await.unwrap().text(), "first");
        assert_eq!(second.calls(), 0);

        // Sequence used up: goes live and appends
        assert_eq!(client.send(get("http://api.example.com/")).await.unwrap().text(), "second");
        assert_eq!(second.calls(), 1);
        assert_eq!(client.session().catalog().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bloody_mode_bypasses_catalog() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(StubTransport::ok("recorded"));
        client(Mode::Record, &dir, &recorder)
            .send(get("http://api.example.com/"))
            .await
            .unwrap();

        let live = Arc::new(StubTransport::ok("live"));
        let client = client(Mode::Bloody, &dir, &live);
        let response = client.send(get("http://api.example.com/")).await.unwrap();
        assert_eq!(response.text(), "live");
        assert_eq!(live.calls(), 1);
        assert!(!client.session().catalog().is_loaded().await);
    }

    #[tokio::test]
    async fn test_cheat_mode_goes_live_without_recording() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::ok("live"));
        let client = client(Mode::Cheat, &dir, &live);

        client.send(get("http://api.example.com/")).await.unwrap();
        client.send(get("http://api.example.com/")).await.unwrap();
        assert_eq!(live.calls(), 2);
        assert_eq!(client.session().catalog().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pass_through_host_skips_fixtures_in_replay_mode() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::ok("live"));
        let client = client(Mode::Replay, &dir, &live);
        client.pass_through(["*.amazonaws.com"]);

        let response = client.send(get("https://s3.amazonaws.com/bucket")).await.unwrap();
        assert_eq!(response.text(), "live");
        assert!(client
            .send(get("https://amazonaws.com/bucket"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_localhost_routing_in_replay_mode() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::ok("local"));
        let client = client(Mode::Replay, &dir, &live);
        client.localhost(["*.example.com"]);
        assert!(client.is_localhost("api.example.com"));

        let response = client.send(get("http://api.example.com:3000/x")).await.unwrap();
        assert_eq!(response.text(), "local");
        assert_eq!(live.last_uri().as_deref(), Some("http://127.0.0.1:3000/x"));

        client.reset(["*.example.com"]);
        assert!(!client.is_localhost("api.example.com"));
        assert!(!client.is_pass_through("api.example.com"));
        assert!(!client.is_dropped("api.example.com"));
    }

    #[tokio::test]
    async fn test_dropped_host_in_cheat_mode() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::ok("live"));
        let client = client(Mode::Cheat, &dir, &live);
        client.drop_host(["ads.example.com"]);

        let err = client.send(get("http://ads.example.com/")).await.unwrap_err();
        assert!(matches!(err, ReplayError::ConnectionDropped(_)));
        assert_eq!(live.calls(), 0);
    }

    struct Teapot;

    #[async_trait]
    impl Handler for Teapot {
        fn name(&self) -> &str {
            "teapot"
        }

        async fn handle(&self, request: &Request, _next: Next<'_>) -> Outcome {
            if request.uri.path() == "/tea" {
                Outcome::Handled(Response::new(418))
            } else {
                Outcome::Declined
            }
        }
    }

    #[tokio::test]
    async fn test_user_handler_runs_first() {
        let dir = TempDir::new().unwrap();
        let live = Arc::new(StubTransport::ok("live"));
        let client = client(Mode::Replay, &dir, &live);
        client.use_handler(Teapot);

        assert_eq!(client.chain().names()[0], "teapot");
        let response = client.send(get("http://api.example.com/tea")).await.unwrap();
        assert_eq!(response.status, 418);
        assert!(client.send(get("http://api.example.com/coffee")).await.is_err());
    }
}
