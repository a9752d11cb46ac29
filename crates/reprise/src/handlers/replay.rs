//! Answers requests from the fixture catalog.

use crate::catalog::ExhaustionPolicy;
use crate::chain::{Handler, Next, Outcome};
use crate::error::ReplayError;
use crate::message::Request;
use crate::metrics;
use crate::mode::Mode;
use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Serves recorded responses. Declines in bloody mode.
pub struct Replay {
    session: Arc<Session>,
}

impl Replay {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Record mode treats a used-up sequence as a miss so the next live response
    /// is captured after it.
    fn policy(&self) -> ExhaustionPolicy {
        match self.session.mode() {
            Mode::Record => ExhaustionPolicy::Fail,
            _ => self.session.catalog().exhaustion(),
        }
    }
}

#[async_trait]
impl Handler for Replay {
    fn name(&self) -> &str {
        "replay"
    }

    async fn handle(&self, request: &Request, _next: Next<'_>) -> Outcome {
        let mode = self.session.mode();
        if !mode.uses_fixtures() {
            return Outcome::Declined;
        }

        let catalog = self.session.catalog();
        let fingerprint = catalog.fingerprint(request);
        let method = request.method.as_str();

        match catalog.consume_with(&fingerprint, self.policy()).await {
            Ok(Some(response)) => {
                metrics::record_outcome(method, "replayed");
                debug!(
                    "Replaying {} {} -> {} (fingerprint {})",
                    method,
                    fingerprint.url,
                    response.status,
                    fingerprint.digest()
                );
                Outcome::Handled(response)
            }
            Ok(None) if mode == Mode::Replay => {
                metrics::record_outcome(method, "no_fixture");
                Outcome::Failed(ReplayError::NoFixture {
                    method: fingerprint.method,
                    url: fingerprint.url,
                })
            }
            Ok(None) => {
                debug!(
                    "No fixture for {} {} (fingerprint {})",
                    method,
                    fingerprint.url,
                    fingerprint.digest()
                );
                Outcome::Declined
            }
            Err(err) => Outcome::Failed(err),
        }
    }
}
