//! Captures live responses into the fixture catalog.

use crate::chain::{Handler, Next, Outcome};
use crate::message::Request;
use crate::metrics;
use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// In record mode, runs the rest of the chain and stores what comes back.
///
/// A response is handed to the caller only once it is on disk; a failed write
/// fails the request.
pub struct Recorder {
    session: Arc<Session>,
}

impl Recorder {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Handler for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn handle(&self, request: &Request, next: Next<'_>) -> Outcome {
        if !self.session.mode().records() {
            return Outcome::Declined;
        }

        let response = match next.run(request).await {
            Ok(response) => response,
            Err(err) => return Outcome::Failed(err),
        };

        match self.session.catalog().record(request, &response).await {
            Ok(()) => {
                metrics::record_fixture_write(true);
                metrics::record_outcome(request.method.as_str(), "recorded");
                Outcome::Handled(response)
            }
            Err(err) => {
                metrics::record_fixture_write(false);
                error!("Failed to record {} {}: {}", request.method, request.uri, err);
                Outcome::Failed(err)
            }
        }
    }
}
