//! Request/response logging.

use crate::chain::{Handler, Next, Outcome};
use crate::message::Request;
use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Logs every request and how it ended. Never changes the result.
pub struct Logger {
    session: Arc<Session>,
}

impl Logger {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Handler for Logger {
    fn name(&self) -> &str {
        "logger"
    }

    async fn handle(&self, request: &Request, next: Next<'_>) -> Outcome {
        let fingerprint = self.session.catalog().fingerprint(request);
        let digest = fingerprint.digest();
        debug!(
            method = %request.method,
            url = %fingerprint.url,
            fingerprint = %digest,
            mode = %self.session.mode(),
            "request"
        );

        let started = Instant::now();
        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(response) => info!(
                method = %request.method,
                url = %fingerprint.url,
                status = response.status,
                fingerprint = %digest,
                elapsed_ms,
                "response"
            ),
            Err(err) => warn!(
                method = %request.method,
                url = %fingerprint.url,
                error = %err,
                kind = err.kind(),
                fingerprint = %digest,
                "request failed"
            ),
        }
        result.into()
    }
}
